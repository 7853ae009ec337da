extern crate chan;
extern crate chan_signal;
extern crate env_logger;
extern crate getopts;
#[macro_use]
extern crate log;
extern crate uptane;

use chan::Receiver;
use chan_signal::Signal;
use env_logger::LogBuilder;
use getopts::Options;
use log::LogLevelFilter;
use std::{env, process, thread};
use std::time::Duration;

use uptane::datatype::{Config, RunningMode, SignatureType};
use uptane::events::Bus;
use uptane::http::HttpClient;
use uptane::keymanager::{self, KeyManager, KeySource};
use uptane::orchestrator::Orchestrator;
use uptane::pacman::PackageManager;
use uptane::trust_store::TrustStore;

macro_rules! exit {
    ($code:expr, $fmt:expr, $($arg:tt)*) => {{
        println!($fmt, $($arg)*);
        process::exit($code);
    }}
}

fn main() {
    start_logging();
    let config = build_config();

    let (public, private) = keymanager::load_uptane_keypair(
        &config.uptane.public_key_path, &config.uptane.private_key_path,
    ).unwrap_or_else(|err| exit!(2, "couldn't load uptane keypair: {}", err));

    let keys = KeyManager::from_files(
        KeySource::File,
        &config.tls.ca_file, &config.tls.cert_file, &config.tls.pkey_file,
        private, public, SignatureType::Ed25519,
    ).unwrap_or_else(|err| exit!(2, "couldn't load tls credentials: {}", err));

    let store = TrustStore::open(&config.storage.sqlite_path)
        .unwrap_or_else(|err| exit!(2, "couldn't open trust store: {}", err));

    let client = HttpClient::default();
    let bus = Bus::new();
    bus.subscribe(|event| info!("{:?}", event));

    let pacman_tag: PackageManager = config.pacman.kind.parse()
        .unwrap_or_else(|err| exit!(2, "invalid pacman config: {}", err));
    let pacman = pacman_tag.build();

    let orchestrator = Orchestrator::new(&config, &client, &store, &keys, &bus, &*pacman, Default::default());
    orchestrator.register_ecus().unwrap_or_else(|err| exit!(2, "couldn't register ecus: {}", err));

    let signals = chan_signal::notify(&[Signal::INT, Signal::TERM]);
    thread::spawn(move || start_signal_handler(&signals));

    loop {
        if let Err(err) = orchestrator.run_cycle() {
            error!("cycle failed: {}", err);
        }

        if config.uptane.running_mode == RunningMode::Once {
            break;
        }
        thread::sleep(Duration::from_secs(config.uptane.polling_sec));
    }
}

fn start_signal_handler(signals: &Receiver<Signal>) {
    loop {
        match signals.recv() {
            Some(Signal::INT) | Some(Signal::TERM) => process::exit(0),
            _ => (),
        }
    }
}

fn start_logging() {
    let mut builder = LogBuilder::new();
    builder.filter(Some("uptane"), LogLevelFilter::Info);
    if let Ok(level) = env::var("RUST_LOG") {
        builder.parse(&level);
    }
    builder.init().expect("couldn't start logger");
}

fn build_config() -> Config {
    let args: Vec<String> = env::args().collect();
    let program = args[0].clone();

    let mut opts = Options::new();
    opts.optopt("c", "config", "path to the client's toml config file", "PATH");
    opts.optflag("h", "help", "print this help menu");
    opts.optflag("", "print", "print the parsed config and exit");

    let matches = opts.parse(&args[1..]).unwrap_or_else(|err| exit!(1, "{}", err));
    if matches.opt_present("help") {
        exit!(0, "{}", opts.usage(&format!("Usage: {} [options]", program)));
    }

    let path = matches.opt_str("config")
        .or_else(|| env::var("UPTANE_CONFIG").ok())
        .unwrap_or_else(|| exit!(1, "{}", "no config file given: pass --config or set UPTANE_CONFIG"));

    let config = Config::load(&path).unwrap_or_else(|err| exit!(2, "couldn't load config: {}", err));
    if matches.opt_present("print") {
        exit!(0, "{:#?}", config);
    }
    config
}
