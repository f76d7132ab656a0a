//! Console chat gateway
//!
//! Reads chat messages line by line and writes replies and announcements as
//! text. Each message is answered on its own task so a slow command never
//! holds up the next one; replies are written in completion order.
//!
//! Closing the input ends only the chat side. [`ConsoleGateway::run`] hands the
//! announcement receiver back so [`forward_announcements`] can keep bridge
//! services such as `hourLeft` delivering.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::commands::handle_message;
use crate::context::BotContext;
use crate::reply::Reply;

/// Replies waiting to be written
const OUTBOUND_CAPACITY: usize = 64;

enum Outbound {
    Reply(Reply),
    Announcement(Reply),
}

pub struct ConsoleGateway<R, W> {
    input: R,
    output: W,
}

impl<R, W> ConsoleGateway<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Serve until the input ends, then flush replies still in flight
    ///
    /// Announcements are written as they arrive while the input is open. The
    /// output and the still-open announcement receiver are returned.
    pub async fn run(
        self,
        ctx: Arc<BotContext>,
        mut announcements: mpsc::Receiver<Reply>,
    ) -> std::io::Result<(W, mpsc::Receiver<Reply>)> {
        let ConsoleGateway { input, mut output } = self;
        let (tx, mut rx) = mpsc::channel::<Reply>(OUTBOUND_CAPACITY);
        let mut lines = input.lines();
        let mut input_open = true;

        while input_open {
            let outbound = tokio::select! {
                line = lines.next_line() => {
                    match line? {
                        Some(line) => {
                            let ctx = ctx.clone();
                            let tx = tx.clone();
                            tokio::spawn(async move {
                                if let Some(reply) = handle_message(&ctx, &line).await {
                                    let _ = tx.send(reply).await;
                                }
                            });
                        }
                        None => {
                            debug!("Console input reached EOF");
                            input_open = false;
                        }
                    }
                    None
                }
                Some(reply) = rx.recv() => Some(Outbound::Reply(reply)),
                Some(reply) = announcements.recv() => Some(Outbound::Announcement(reply)),
            };

            if let Some(outbound) = outbound {
                write_outbound(&mut output, outbound).await?;
            }
        }

        // Let in-flight commands finish
        drop(tx);
        while let Some(reply) = rx.recv().await {
            write_outbound(&mut output, Outbound::Reply(reply)).await?;
        }

        info!("Console input closed");
        Ok((output, announcements))
    }
}

/// Write announcements until every sender is gone
pub async fn forward_announcements<W: AsyncWrite + Unpin>(
    mut announcements: mpsc::Receiver<Reply>,
    mut output: W,
) -> std::io::Result<W> {
    while let Some(reply) = announcements.recv().await {
        write_outbound(&mut output, Outbound::Announcement(reply)).await?;
    }
    Ok(output)
}

async fn write_outbound<W: AsyncWrite + Unpin>(output: &mut W, outbound: Outbound) -> std::io::Result<()> {
    let text = match outbound {
        Outbound::Reply(reply) => format!("{}\n", reply),
        Outbound::Announcement(reply) => format!("[announcement] {}\n", reply),
    };
    output.write_all(text.as_bytes()).await?;
    output.flush().await
}
