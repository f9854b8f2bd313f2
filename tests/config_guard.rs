// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use regex::Regex;
use std::fs;
use std::path::Path;

/// Fail CI if config files contain macaroons or planner API keys.
#[test]
fn no_committed_credentials_in_configs() {
    let macaroon = Regex::new(r"0201[a-fA-F0-9]{60,}").unwrap();
    let api_key = Regex::new(r#"(?i)planner_api_key\s*=\s*"[^"]+""#).unwrap();
    let candidates = [
        "config.toml",
        "config.example.toml",
        "config.prod.toml",
        "config.dev.toml",
    ];
    for file in candidates {
        if !Path::new(file).exists() {
            continue;
        }
        let body = fs::read_to_string(file).expect("read config");
        for (idx, line) in body.lines().enumerate() {
            if line.trim_start().starts_with('#') {
                continue;
            }
            if macaroon.is_match(line) {
                panic!("Macaroon-looking hex in {} at line {}", file, idx + 1);
            }
            if api_key.is_match(line) {
                panic!("Planner API key in {} at line {}", file, idx + 1);
            }
        }
    }
}
