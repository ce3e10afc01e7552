use std::sync::Arc;

use embedded_svc::http::server::{HandlerResult, Request};
use embedded_svc::http::Method;
use embedded_svc::io::{Read, Write};
use esp_idf_svc::http::server::{Configuration, EspHttpConnection, EspHttpServer};
use log::*;

use crate::ingest::{self, Reply, Staging};
use crate::playback::assets::{AssetKind, DirLibrary};
use crate::storage::Arena;

const CHUNK: usize = 1024;

/// Upload and status endpoints. The server stops when the returned handle
/// is dropped.
pub fn serve(arena: Arc<Arena>, library: DirLibrary, frame_len: usize) -> anyhow::Result<EspHttpServer> {
    let mut server = EspHttpServer::new(&Configuration {
        stack_size: 10240,
        ..Default::default()
    })?;
    let library = Arc::new(library);

    let frames = arena.clone();
    server.fn_handler("/write", Method::Post, move |mut req| {
        let uri = req.uri().to_string();
        let reply = match receive(&mut req, frames.geometry().block_size) {
            Ok(staging) => ingest::upload_to(&frames, &uri, staging.as_slice()),
            Err(reply) => reply,
        };
        respond(req, reply)
    })?;

    for (uri, kind) in [("/write_char", AssetKind::Characters), ("/write_img", AssetKind::Pictures)] {
        let library = library.clone();
        server.fn_handler(uri, Method::Post, move |mut req| {
            let reply = match receive(&mut req, frame_len) {
                Ok(staging) => ingest::store_asset(&library, kind, staging.as_slice(), frame_len),
                Err(reply) => reply,
            };
            respond(req, reply)
        })?;
    }

    server.fn_handler("/status", Method::Get, move |req| respond(req, ingest::status(&arena)))?;

    info!("HTTP server listening: POST /write, /write_char, /write_img; GET /status");
    Ok(server)
}

/// Reads the whole body, bailing out with a ready reply when it is too big
/// or the connection drops.
fn receive(req: &mut Request<&mut EspHttpConnection>, limit: usize) -> Result<Staging, Reply> {
    let mut staging = Staging::new(limit);
    let mut buf = [0u8; CHUNK];
    loop {
        let n = req.read(&mut buf).map_err(|e| {
            warn!("Upload aborted after {} bytes: {:?}", staging.len(), e);
            Reply::error(500, "Upload interrupted")
        })?;
        if n == 0 {
            return Ok(staging);
        }
        if let Err(e) = staging.push(&buf[..n]) {
            warn!("{}", e);
            return Err(Reply::error(400, "Data too large"));
        }
    }
}

fn respond(req: Request<&mut EspHttpConnection>, reply: Reply) -> HandlerResult {
    let mut resp = req.into_response(reply.status, None, &[("Content-Type", "application/json")])?;
    resp.write_all(reply.body.as_bytes())?;
    Ok(())
}
