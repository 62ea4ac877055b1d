#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use netmux::config::{LogConfig, SessionConfig};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};

pub const PROMPT: &str = "<sw1>";

/// Lines received by a fake device, in order.
pub type Received = Arc<Mutex<Vec<String>>>;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Short idle windows so paused-clock tests stay readable.
pub fn test_config() -> SessionConfig {
    SessionConfig {
        command_idle_secs: 1.0,
        brand_idle_secs: 1.0,
        alive_idle_secs: 1.0,
        banner_idle_secs: 0.1,
        log: LogConfig::quiet(),
        ..Default::default()
    }
}

/// Spawns a device that prints a banner and prompt, then echoes every line
/// followed by `respond(line)` and the prompt again.
pub fn fake_device<F>(respond: F) -> (DuplexStream, Received)
where
    F: Fn(&str) -> String + Send + 'static,
{
    let (client, device) = tokio::io::duplex(64 * 1024);
    let received: Received = Arc::new(Mutex::new(Vec::new()));
    let log = received.clone();

    tokio::spawn(async move {
        let (read, mut write) = tokio::io::split(device);
        let banner = format!("Info: The max number of VTY users is 5.\r\n{PROMPT}");
        if write.write_all(banner.as_bytes()).await.is_err() {
            return;
        }
        let mut lines = BufReader::new(read).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            log.lock().unwrap().push(line.clone());
            let reply = format!("{line}\r\n{}{PROMPT}", respond(&line));
            if write.write_all(reply.as_bytes()).await.is_err() {
                break;
            }
        }
    });

    (client, received)
}

/// Responses of a Huawei VRP switch.
pub fn vrp(command: &str) -> String {
    match command.trim() {
        "" => String::new(),
        "dis version" | "display version" => concat!(
            "Huawei Versatile Routing Platform Software\r\n",
            "VRP (R) software, Version 5.170 (S5720 V200R011C10SPC500)\r\n",
        )
        .to_string(),
        "display clock" => "2024-05-01 10:00:00+08:00\r\n".to_string(),
        _ => "Error: Unrecognized command found at '^' position.\r\n".to_string(),
    }
}

/// Responses of a Cisco IOS switch.
pub fn ios(command: &str) -> String {
    match command.trim() {
        "" => String::new(),
        "show version" => "Cisco IOS Software, C2960 Software (C2960-LANBASEK9-M)\r\n".to_string(),
        _ => "% Invalid input detected at '^' marker.\r\n".to_string(),
    }
}

/// Number of times `command` was received.
pub fn count(received: &Received, command: &str) -> usize {
    received
        .lock()
        .unwrap()
        .iter()
        .filter(|line| line.as_str() == command)
        .count()
}
