use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = dagu_worker::Args::parse();

	dagu_worker::run(args).await
}
