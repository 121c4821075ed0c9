//! Reading, editing and writing an Arma 3 style `server.cfg`.
//!
//! Run with: cargo run --example server_config [path/to/server.cfg]

use kvcfg::{from_reader, key_value_record, to_string};
use std::error::Error;
use std::fs::File;
use std::io::BufReader;

key_value_record! {
    #[derive(Debug, Default, Clone, PartialEq)]
    pub struct ArmaServerOptions {
        pub password_admin as "passwordAdmin": Option<String>,
        pub password: Option<String>,
        pub hostname: Option<String>,
        pub max_players as "maxPlayers": Option<u32>,
        pub motd as "motd[]": Option<Vec<String>>,
        pub motd_interval as "motdInterval": Option<u32>,
        pub admins as "admins[]": Option<Vec<String>>,
        pub headless_clients as "headlessClients[]": Option<Vec<String>>,
        pub vote_threshold as "voteThreshold": Option<f64>,
        pub vote_mission_players as "voteMissionPlayers": Option<u32>,
        pub kick_duplicate as "kickDuplicate": Option<u32>,
        pub loopback: Option<bool>,
        pub upnp: Option<bool>,
        pub allowed_load_file_extensions as "allowedLoadFileExtensions[]": Option<Vec<String>>,
        pub on_user_connected as "onUserConnected": Option<String>,
        pub disconnect_timeout as "disconnectTimeout": Option<u32>,
        pub max_desync as "maxdesync": Option<u32>,
        pub max_ping as "maxping": Option<u32>,
    }
}

const SAMPLE: &str = r#"// GLOBAL SETTINGS
hostname = "Fun and Test Server";
password = "";
passwordAdmin = "xyz";

// WELCOME MESSAGE ("message of the day")
motd[] = {
    "",
    "Welcome to our server",
    "",
    "We are looking for fun - Join us Now !",
    "http://www.example.com",
    "One more line"
};
motdInterval = 5;

// JOINING RULES
maxPlayers = 64;
kickDuplicate = 1;
loopback = false;
upnp = false;
admins[] = {"76561198000000001", "76561198000000002"};
headlessClients[] = {"127.0.0.1"};

// VOTING
voteMissionPlayers = 1;
voteThreshold = 0.33;

// SCRIPTING
allowedLoadFileExtensions[] = {"hpp", "sqs", "sqf", "fsm", "cpp", "paa", "txt", "xml", "inc", "ext", "sqm", "ods", "fxy", "lip", "csv", "kb", "bik", "bikb", "html", "htm", "biedi"};
onUserConnected = "";

// TIMEOUTS
disconnectTimeout = 5;
maxdesync = 150;
maxping = 200;
"#;

fn main() -> Result<(), Box<dyn Error>> {
    let options: ArmaServerOptions = match std::env::args().nth(1) {
        Some(path) => from_reader(BufReader::new(File::open(path)?))?,
        None => kvcfg::from_str(SAMPLE)?,
    };

    println!("Hostname:    {:?}", options.hostname);
    println!("Max players: {:?}", options.max_players);
    println!("MOTD lines:  {}", options.motd.as_ref().map_or(0, Vec::len));
    println!("Admins:      {:?}", options.admins);

    // Tighten the rules and write the file back out
    let updated = ArmaServerOptions {
        max_players: Some(32),
        max_ping: Some(150),
        password: None,
        ..options
    };
    let text = to_string(&updated)?;
    println!("\nUpdated config:\n{}", text);

    let reparsed: ArmaServerOptions = kvcfg::from_str(&text)?;
    assert_eq!(reparsed, updated);
    println!("✓ Round-trip successful");

    Ok(())
}
