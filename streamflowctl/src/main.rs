use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = streamflowctl::Cli::parse();
    if let Err(err) = streamflowctl::run(cli).await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
