use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[clap(name = "orcanet", about = "Browse and trade files on an OrcaNet node")]
pub struct Args {
	/// Base url of the node's HTTP api
	#[clap(long, value_name = "URL")]
	pub api: Option<String>,
	#[clap(long, value_name = "PATH")]
	pub download_dir: Option<PathBuf>,
	#[clap(short, long, action = clap::ArgAction::Count)]
	pub verbose: u8,
	#[clap(subcommand)]
	pub command: Command,
}

#[derive(Debug, Parser)]
pub enum Command {
	/// Print a section as a table
	List {
		section: String,
		#[clap(long = "type", value_name = "document|media|other")]
		kind: Option<String>,
		#[clap(long, value_name = "less1mb|less1gb|more1gb")]
		size: Option<String>,
		#[clap(long, value_name = "today|7days|30days|6months|thisyear|lastyear")]
		date: Option<String>,
		#[clap(long, value_name = "less5|5to20|more20")]
		price: Option<String>,
		#[clap(long, value_name = "less100|100to1000|more1000")]
		downloads: Option<String>,
		#[clap(long, value_name = "COLUMN")]
		sort: Option<String>,
		#[clap(long)]
		desc: bool,
	},
	Wallet,
	/// Find providers of a hash and buy the file from one of them
	Download {
		hash: String,
		#[clap(long)]
		peer: Option<String>,
		#[clap(long)]
		yes: bool,
	},
	Delete {
		section: String,
		#[clap(required = true)]
		hashes: Vec<String>,
		#[clap(long)]
		yes: bool,
	},
	Host {
		hash: String,
		#[clap(long)]
		price: String,
		#[clap(long, default_value = "storing")]
		from: String,
		#[clap(long)]
		yes: bool,
	},
	Share {
		hash: String,
		#[clap(long, default_value = "storing")]
		from: String,
		#[clap(long)]
		yes: bool,
	},
}
