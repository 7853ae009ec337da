extern crate base64;
extern crate bincode;
extern crate byteorder;
extern crate chan;
extern crate chrono;
extern crate hex;
extern crate hyper;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;
extern crate net2;
extern crate openssl;
extern crate pem;
extern crate ring;
extern crate rusqlite;
extern crate serde;
#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate serde_json;
extern crate toml;
extern crate untrusted;
extern crate url;
extern crate uuid;

pub mod crypto;
pub mod datatype;
pub mod events;
pub mod fetcher;
pub mod http;
pub mod keymanager;
pub mod orchestrator;
pub mod pacman;
pub mod reconciler;
pub mod secondary;
pub mod trust_store;
pub mod verifier;
