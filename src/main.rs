use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = mailpipe::cli::Cli::parse();

    if let Err(err) = mailpipe::run(cli).await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
