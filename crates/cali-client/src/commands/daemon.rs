//! `cali status` and `cali ping`.

use std::io::Write;

use cali_core::{FormatError, OutputFormat};
use cali_protocol::StatusInfo;

use crate::commands::Context;
use crate::error::{ClientError, ClientResult};

pub async fn ping(ctx: &Context, out: &mut impl Write) -> ClientResult<()> {
    let socket = ctx.socket_client();
    if !socket.ping().await {
        return Err(ClientError::Connection(format!(
            "no daemon answering on {}",
            socket.socket_path().display()
        )));
    }
    writeln!(out, "pong")?;
    Ok(())
}

pub async fn status(ctx: &Context, out: &mut impl Write) -> ClientResult<()> {
    let info = ctx.socket_client().status().await?;
    out.write_all(render_status(&info, ctx.format)?.as_bytes())?;
    Ok(())
}

fn render_status(info: &StatusInfo, format: OutputFormat) -> Result<String, FormatError> {
    let mut text = match format {
        OutputFormat::Json => serde_json::to_string_pretty(info)?,
        OutputFormat::Yaml => serde_yaml::to_string(info)?,
        OutputFormat::Ical => return Err(FormatError::IcalUnsupported("status")),
    };
    if !text.ends_with('\n') {
        text.push('\n');
    }
    Ok(text)
}
