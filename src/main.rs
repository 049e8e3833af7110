use reactor_httpd::config::{CliArgs, Config};
use reactor_httpd::{logger, server};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse(std::env::args().skip(1))?;

    let mut cfg = match args.config_path.as_deref() {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    cfg.apply_args(&args);

    logger::init(&cfg);

    let server = server::start(&cfg)?;
    server::install_shutdown_handler(server.reactor_handle())?;

    server.wait()?;
    Ok(())
}
