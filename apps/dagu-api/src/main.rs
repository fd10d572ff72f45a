use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = dagu_api::Args::parse();

	dagu_api::run(args).await
}
