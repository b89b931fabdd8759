use args::Command;
use clap::Parser;
use orcanet_core::Config;
use orcanet_core::filter::FilterField;

mod args;
mod commands;
mod render;

fn log_level(verbose: u8) -> log::Level {
	match verbose {
		0 => log::Level::Warn,
		1 => log::Level::Info,
		2 => log::Level::Debug,
		_ => log::Level::Trace,
	}
}

async fn run(args: args::Args) -> anyhow::Result<()> {
	let mut config = Config::load()?;
	if let Some(api) = args.api {
		config.api_url = api;
	}
	if let Some(dir) = args.download_dir {
		config.download_dir = dir;
	}
	config.validate()?;
	log::info!("using node at {}", config.api_url);
	let client = commands::Client::new(&config)?;

	match args.command {
		Command::List {
			section,
			kind,
			size,
			date,
			price,
			downloads,
			sort,
			desc,
		} => {
			let filters = vec![
				(FilterField::Type, kind),
				(FilterField::Size, size),
				(FilterField::Date, date),
				(FilterField::Price, price),
				(FilterField::Downloads, downloads),
			];
			client.list(&section, filters, sort.as_deref(), desc).await
		}
		Command::Wallet => client.wallet().await,
		Command::Download { hash, peer, yes } => client.download(&hash, peer.as_deref(), yes).await,
		Command::Delete {
			section,
			hashes,
			yes,
		} => client.delete(&section, &hashes, yes).await,
		Command::Host {
			hash,
			price,
			from,
			yes,
		} => client.host(&from, &hash, &price, yes).await,
		Command::Share { hash, from, yes } => client.share(&from, &hash, yes).await,
	}
}

#[tokio::main]
async fn main() {
	let args = args::Args::parse();
	if let Err(err) = simple_logger::init_with_level(log_level(args.verbose)) {
		eprintln!("failed to init logger: {err}");
	}

	if let Err(err) = run(args).await {
		log::error!("{err:#}");
		eprintln!("error: {err:#}");
		std::process::exit(1);
	}
}
