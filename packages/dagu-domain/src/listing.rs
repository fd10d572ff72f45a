use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
#[error("Unknown value {0:?}.")]
pub struct UnknownValue(pub String);

/// Marketplace a listing link points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
	Bunjang,
	Joonggonara,
	Danggn,
	Mule,
	Other,
}
impl Source {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Bunjang => "bunjang",
			Self::Joonggonara => "joonggonara",
			Self::Danggn => "danggn",
			Self::Mule => "mule",
			Self::Other => "other",
		}
	}

	/// Source implied by a link's host. Unknown hosts map to `Other`.
	pub fn infer(link: &str) -> Self {
		let Some(host) = link_host(link) else {
			return Self::Other;
		};

		if host.contains("bunjang") {
			Self::Bunjang
		} else if host.contains("joongna") || host.contains("cafe.naver") {
			Self::Joonggonara
		} else if host.contains("daangn") || host.contains("danggeun") {
			Self::Danggn
		} else if host.contains("mule") {
			Self::Mule
		} else {
			Self::Other
		}
	}
}

impl fmt::Display for Source {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Source {
	type Err = UnknownValue;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_lowercase().as_str() {
			"bunjang" => Ok(Self::Bunjang),
			"joonggonara" => Ok(Self::Joonggonara),
			"danggn" => Ok(Self::Danggn),
			"mule" => Ok(Self::Mule),
			"other" => Ok(Self::Other),
			_ => Err(UnknownValue(s.to_string())),
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportReason {
	WrongPrice,
	SoldOut,
	Fake,
	Inappropriate,
	Other,
}
impl ReportReason {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::WrongPrice => "wrong_price",
			Self::SoldOut => "sold_out",
			Self::Fake => "fake",
			Self::Inappropriate => "inappropriate",
			Self::Other => "other",
		}
	}
}

impl FromStr for ReportReason {
	type Err = UnknownValue;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim() {
			"wrong_price" => Ok(Self::WrongPrice),
			"sold_out" => Ok(Self::SoldOut),
			"fake" => Ok(Self::Fake),
			"inappropriate" => Ok(Self::Inappropriate),
			"other" => Ok(Self::Other),
			_ => Err(UnknownValue(s.to_string())),
		}
	}
}

/// Lowercased host of an http(s) link, without credentials or port.
pub fn link_host(link: &str) -> Option<String> {
	let lowered = link.trim().to_lowercase();
	let rest = lowered.strip_prefix("https://").or_else(|| lowered.strip_prefix("http://"))?;
	let authority = rest.split(['/', '?', '#']).next()?;
	let host_port = authority.rsplit('@').next()?;

	if host_port.starts_with('[') {
		return None;
	}

	let host = host_port.split(':').next()?.trim_end_matches('.');

	if host.is_empty() { None } else { Some(host.to_string()) }
}

/// Whether the link is http(s) and its host is an allowed domain or one of its subdomains.
pub fn is_allowed_link(link: &str, allowed_domains: &[String]) -> bool {
	let Some(host) = link_host(link) else {
		return false;
	};

	allowed_domains.iter().any(|domain| {
		host == *domain
			|| host.strip_suffix(domain.as_str()).is_some_and(|prefix| prefix.ends_with('.'))
	})
}

/// Percent below the catalog reference price, rounded to one decimal.
pub fn discount_rate(price: i64, reference_price: i64) -> f64 {
	if reference_price <= 0 {
		return 0.0;
	}

	let rate = (1.0 - price as f64 / reference_price as f64) * 100.0;

	(rate * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
	use super::*;

	fn domains() -> Vec<String> {
		["bunjang.co.kr", "cafe.naver.com", "daangn.com"].iter().map(|d| d.to_string()).collect()
	}

	#[test]
	fn allowed_links_accept_subdomains() {
		assert!(is_allowed_link("https://m.bunjang.co.kr/products/1", &domains()));
		assert!(is_allowed_link("HTTP://Bunjang.co.kr:443?x=1", &domains()));
		assert!(is_allowed_link("https://user@cafe.naver.com/joonggonara/1", &domains()));
		assert!(!is_allowed_link("https://evilbunjang.co.kr/1", &domains()));
		assert!(!is_allowed_link("https://bunjang.co.kr.evil.com/1", &domains()));
		assert!(!is_allowed_link("ftp://bunjang.co.kr/1", &domains()));
		assert!(!is_allowed_link("bunjang.co.kr/1", &domains()));
	}

	#[test]
	fn source_follows_host() {
		assert_eq!(Source::infer("https://m.bunjang.co.kr/products/1"), Source::Bunjang);
		assert_eq!(Source::infer("https://cafe.naver.com/joonggonara/1"), Source::Joonggonara);
		assert_eq!(Source::infer("https://www.daangn.com/articles/1"), Source::Danggn);
		assert_eq!(Source::infer("https://www.mule.co.kr/bbs/1"), Source::Mule);
		assert_eq!(Source::infer("https://secondhand.co.kr/1"), Source::Other);
	}

	#[test]
	fn discount_rate_rounds_to_one_decimal() {
		assert_eq!(discount_rate(300_000, 450_000), 33.3);
		assert_eq!(discount_rate(500_000, 450_000), -11.1);
		assert_eq!(discount_rate(100_000, 0), 0.0);
	}
}
