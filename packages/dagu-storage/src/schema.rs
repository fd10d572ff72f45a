pub fn render_schema() -> String {
	let init = include_str!("../../../sql/init.sql");

	expand_includes(init)
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		let trimmed = line.trim();

		if let Some(path) = trimmed.strip_prefix("\\ir ") {
			match path.trim() {
				"00_extensions.sql" => out.push_str(include_str!("../../../sql/00_extensions.sql")),
				"tables/001_brands.sql" =>
					out.push_str(include_str!("../../../sql/tables/001_brands.sql")),
				"tables/002_instruments.sql" =>
					out.push_str(include_str!("../../../sql/tables/002_instruments.sql")),
				"tables/003_listings.sql" =>
					out.push_str(include_str!("../../../sql/tables/003_listings.sql")),
				"tables/004_listing_clicks.sql" =>
					out.push_str(include_str!("../../../sql/tables/004_listing_clicks.sql")),
				"tables/005_listing_reports.sql" =>
					out.push_str(include_str!("../../../sql/tables/005_listing_reports.sql")),
				"tables/006_search_queries.sql" =>
					out.push_str(include_str!("../../../sql/tables/006_search_queries.sql")),
				"tables/007_search_misses.sql" =>
					out.push_str(include_str!("../../../sql/tables/007_search_misses.sql")),
				"tables/008_search_cache.sql" =>
					out.push_str(include_str!("../../../sql/tables/008_search_cache.sql")),
				_ => out.push_str(line),
			}
		} else {
			out.push_str(line);
		}

		out.push('\n');
	}

	out
}
