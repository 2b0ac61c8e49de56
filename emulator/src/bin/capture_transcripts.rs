use std::io;

#[allow(dead_code)]
#[path = "../hardware.rs"]
mod hardware;

#[allow(dead_code)]
#[path = "../session.rs"]
mod session;

use session::{Session, TranscriptProfile};

fn main() -> io::Result<()> {
    record_profile(TranscriptProfile::BringUp)?;
    record_profile(TranscriptProfile::Hdr)?;
    record_profile(TranscriptProfile::Fault)?;
    Ok(())
}

fn record_profile(profile: TranscriptProfile) -> io::Result<()> {
    let mut session = Session::new(&profile.options())?;
    match profile {
        TranscriptProfile::BringUp => record_bring_up(&mut session),
        TranscriptProfile::Hdr => record_hdr(&mut session),
        TranscriptProfile::Fault => record_fault(&mut session),
    }
}

fn complete(session: &mut Session, buffer: &str) -> io::Result<()> {
    session.handle_completion(buffer, buffer.len()).map(|_| ())
}

fn run(session: &mut Session, lines: &[&str]) -> io::Result<()> {
    for line in lines {
        session.handle_command(line)?;
    }
    Ok(())
}

fn record_bring_up(session: &mut Session) -> io::Result<()> {
    complete(session, "po")?;
    complete(session, "power ")?;
    complete(session, "mode ")?;
    complete(session, "mode set ")?;
    complete(session, "mode set width=4608 ")?;
    complete(session, "set ex")?;

    run(
        session,
        &[
            "power on",
            "identify",
            "mode list",
            "mode set width=4608 height=2592",
            "set exposure=20000",
            "set analogue-gain=480",
            "stream start",
            "status",
            "stream stop",
            "power off",
            "telemetry",
        ],
    )
}

fn record_hdr(session: &mut Session) -> io::Result<()> {
    complete(session, "mode set width=2304 height=1296 h")?;
    complete(session, "config ")?;

    run(
        session,
        &[
            "power on",
            "identify",
            "config qbc=0",
            "mode set width=2304 height=1296 hdr=1",
            "set exposure=8000",
            "get exposure",
            "stream start",
            "set hflip=1",
            "stream",
            "stream stop",
            "telemetry",
        ],
    )
}

fn record_fault(session: &mut Session) -> io::Result<()> {
    complete(session, "st")?;

    run(
        session,
        &[
            "stream start",
            "identify",
            "power on",
            "status",
            "mode set width=640 height=480",
            "set pixel-rate=1",
            "telemetry",
        ],
    )
}
