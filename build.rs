use vergen_gitcl::{CargoBuilder, Emitter, GitclBuilder};

fn main() {
	if let Err(err) = emit() {
		println!("cargo:warning=Build metadata unavailable: {err}");
		println!("cargo:rustc-env=VERGEN_GIT_SHA=unknown");
		println!("cargo:rustc-env=VERGEN_CARGO_TARGET_TRIPLE=unknown");
	}
}

fn emit() -> Result<(), Box<dyn std::error::Error>> {
	let cargo = CargoBuilder::default().target_triple(true).build()?;
	let gitcl = GitclBuilder::default().sha(true).build()?;

	Emitter::default().fail_on_error().add_instructions(&cargo)?.add_instructions(&gitcl)?.emit()?;

	Ok(())
}
