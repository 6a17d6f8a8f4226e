//! User-facing console messages for the install and update flows.
//!
//! Every line is plain text with an optional emoji prefix; colors come from
//! `console` and degrade gracefully on dumb terminals.

use console::style;
use minnow_core::pkg::{pkg_codes, InstallReport, PkgError};

fn prefix(emoji: bool, symbol: &str) -> String {
    if emoji {
        format!("{symbol} ")
    } else {
        String::new()
    }
}

pub fn manifest_found(emoji: bool) {
    println!(
        "{}Found package.json, installing dependencies...",
        prefix(emoji, "\u{1f4e6}")
    );
}

pub fn no_manifest(emoji: bool) {
    println!(
        "{}No package.json found. Run `minnow init` to create one.",
        prefix(emoji, "\u{1f50d}")
    );
}

pub fn no_packages(emoji: bool) {
    println!(
        "{}No packages were provided to install.",
        prefix(emoji, "\u{1f914}")
    );
}

pub fn installing(emoji: bool, specs: &[String]) {
    println!(
        "{}Installing {}...",
        prefix(emoji, "\u{1f69a}"),
        specs.join(", ")
    );
}

pub fn invalid_spec(emoji: bool, raw: &str, error: &PkgError) {
    println!(
        "{}{}",
        prefix(emoji, "\u{26a0}\u{fe0f}"),
        style(format!("Invalid spec \"{raw}\": {}", error.message())).yellow()
    );
}

pub fn not_a_dependency(emoji: bool, name: &str) {
    println!(
        "{}{name} is not a dependency of this project.",
        prefix(emoji, "\u{1f937}")
    );
}

/// Print per-spec failures followed by the batch summary line.
pub fn report(emoji: bool, report: &InstallReport) {
    for error in &report.errors {
        let line = if error.code == pkg_codes::PKG_NOT_FOUND {
            format!("Package {} was not found on the registry.", error.spec)
        } else {
            format!("Could not install {}: {}", error.spec, error.message)
        };
        println!("{}{}", prefix(emoji, "\u{274c}"), style(line).red());
    }

    let store_note = if report.reused_cache > 0 {
        format!(" ({} from store)", report.reused_cache)
    } else {
        String::new()
    };

    println!(
        "{}Installed {} package(s){} in {}ms.",
        prefix(emoji, "\u{2705}"),
        report.installed.len(),
        store_note,
        report.elapsed.as_millis()
    );
}

pub fn update_summary(emoji: bool, updated: &[(String, String, String)], up_to_date: usize) {
    for (name, from, to) in updated {
        println!(
            "{}Updated {name} {} -> {}",
            prefix(emoji, "\u{2b06}\u{fe0f}"),
            style(from).dim(),
            style(to).green()
        );
    }

    if up_to_date > 0 {
        println!(
            "{}{up_to_date} package(s) already up to date.",
            prefix(emoji, "\u{1f44d}")
        );
    }
}
