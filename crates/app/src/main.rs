mod backend;
mod cli;
mod logging;
mod state;

use clap::{Parser, Subcommand};
use cli::{args::Args, op::Op, Cat, Init, Ls, Meta, Rm, Tail, Version};

command_enum! {
    (Init, Init),
    (Ls, Ls),
    (Cat, Cat),
    (Meta, Meta),
    (Tail, Tail),
    (Rm, Rm),
    (Version, Version),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let ctx = match cli::op::OpContext::new(args.config_path) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error: Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    // loading already rejected unknown levels
    let level = ctx.state.config.log_level().unwrap_or(tracing::Level::INFO);
    let guards = logging::init_logging(level, ctx.state.config.log_dir.as_deref());

    let code = match args.command.execute(&ctx).await {
        Ok(output) => {
            let output = output.to_string();
            if !output.is_empty() {
                println!("{}", output);
            }
            0
        }
        Err(e) => {
            tracing::debug!(error = ?e, "command failed");
            eprintln!("Error: {}", e);
            1
        }
    };

    // flush buffered logs before exiting
    drop(guards);
    std::process::exit(code);
}
