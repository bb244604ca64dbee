// src/exec/foreground.rs

//! Foreground command runner used for phase commands (dumps, rsync,
//! rdiff-backup, ...).

use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{debug, info};

use crate::exec::CommandSpec;
use crate::logging::DIAG_TARGET;

/// Run a command to completion, copying its output to stdout and to the
/// diagnostic channel.
///
/// Returns the command's exit code, or `-1` if it was terminated by a
/// signal. `descr` is used in messages like "starting mysql dump".
pub async fn run_with_logging(descr: &str, spec: &CommandSpec, print_cmds: bool) -> Result<i32> {
    info!("starting {descr}");

    if print_cmds {
        info!(target: DIAG_TARGET, "running command: {spec}");
    }

    let mut child = spec
        .to_tokio_command()
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("spawning {descr} ({})", spec.program))?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    // Read both pipes concurrently so neither can fill up and block the child.
    let (out_res, err_res, status) = tokio::join!(
        copy_lines(stdout, descr, "stdout"),
        copy_lines(stderr, descr, "stderr"),
        child.wait(),
    );
    out_res?;
    err_res?;
    let status = status.with_context(|| format!("waiting for {descr}"))?;

    let code = status.code().unwrap_or(-1);
    info!(exit_code = code, success = status.success(), "{descr} finished");
    Ok(code)
}

async fn copy_lines<R>(pipe: Option<R>, descr: &str, stream: &str) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let Some(pipe) = pipe else {
        return Ok(());
    };

    let mut lines = BufReader::new(pipe).lines();
    while let Some(line) = lines
        .next_line()
        .await
        .with_context(|| format!("reading {stream} of {descr}"))?
    {
        println!("{line}");
        info!(target: DIAG_TARGET, stream, "{line}");
    }
    debug!(stream, "{descr}: output closed");
    Ok(())
}
