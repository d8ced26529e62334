//! Build script: render the keeld man page for packaging.

use std::{
    env, fs, io,
    path::{Path, PathBuf},
};

use time::{OffsetDateTime, format_description::well_known::Iso8601};

const FALLBACK_DATE: &str = "1970-01-01";

fn manual_date() -> String {
    let Ok(raw) = env::var("SOURCE_DATE_EPOCH") else {
        return FALLBACK_DATE.into();
    };
    let formatted = raw
        .parse::<i64>()
        .ok()
        .and_then(|seconds| OffsetDateTime::from_unix_timestamp(seconds).ok())
        .and_then(|moment| moment.format(&Iso8601::DATE).ok());
    formatted.unwrap_or_else(|| {
        println!(
            "cargo:warning=Ignoring invalid SOURCE_DATE_EPOCH '{raw}'; using {FALLBACK_DATE}"
        );
        FALLBACK_DATE.into()
    })
}

// OUT_DIR is `<target>/<profile>/build/<crate>-<hash>/out`, possibly with a
// target triple between `<target>` and `<profile>`.
fn man_dir() -> PathBuf {
    let target = env::var("TARGET").unwrap_or_else(|_| "unknown-target".into());
    let profile = env::var("PROFILE").unwrap_or_else(|_| "unknown-profile".into());
    let base = env::var_os("OUT_DIR")
        .map(PathBuf::from)
        .and_then(|out| {
            out.ancestors()
                .find(|dir| dir.file_name().is_some_and(|name| name == "target"))
                .map(PathBuf::from)
        })
        .unwrap_or_else(|| PathBuf::from("target"));
    base.join("generated-man").join(target).join(profile)
}

fn write_page(dir: &Path, name: &str, contents: &str) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    let staged = dir.join(format!("{name}.tmp"));
    fs::write(&staged, contents)?;
    fs::rename(staged, dir.join(name))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    for var in ["CARGO_PKG_VERSION", "SOURCE_DATE_EPOCH", "TARGET", "PROFILE"] {
        println!("cargo:rerun-if-env-changed={var}");
    }

    let binary = env::var("CARGO_PKG_NAME").unwrap_or_else(|_| "keeld".into());
    let version = env::var("CARGO_PKG_VERSION")?;
    let title = binary.to_uppercase();
    let date = manual_date();
    let page = format!(
        ".TH \"{title}\" \"1\" \"{date}\" \"{binary} {version}\" \"Keel Agent Daemon\"\n\
.SH NAME\n\
{binary} \\- keel agent daemon\n\
.SH SYNOPSIS\n\
.B {binary}\n\
[\\fB--config-path\\fR \\fIFILE\\fR] [\\fB--daemon-socket\\fR \\fIURL\\fR]\n\
.SH DESCRIPTION\n\
{binary} serves the agent's endpoint and identity API as JSONL over a Unix\n\
or TCP socket. Requests that arrive before the agent has finished starting\n\
wait for it; if startup fails they are answered with status 503.\n\
.SH ENVIRONMENT\n\
.TP\n\
.B KEEL_DAEMON_SOCKET\n\
Socket URL, for example unix:///run/keel/keeld.sock or tcp://127.0.0.1:9890.\n\
.TP\n\
.B KEEL_READY_TIMEOUT_MS\n\
Upper bound on how long a request waits for the agent.\n"
    );

    let name = format!("{binary}.1");
    write_page(&man_dir(), &name, &page)?;
    if let Some(out_dir) = env::var_os("OUT_DIR") {
        let staged = PathBuf::from(out_dir);
        if let Err(error) = write_page(&staged, &name, &page) {
            println!(
                "cargo:warning=Failed to stage man page in {}: {error}",
                staged.display()
            );
        }
    }
    Ok(())
}
