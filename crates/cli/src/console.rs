//! Console transport: stdin lines in, replies on stdout.
//!
//! Line syntax:
//! - plain text is sent as-is
//! - `[image:SRC]` attaches an image (URL, path, `file://` or `base64://`)
//! - `[quote:SRC]` attaches an image inside a quoted reply

use std::io::Write;

use {
    async_trait::async_trait,
    gemexp_channels::{Error as ChannelError, ReplySink},
    gemexp_common::types::{
        InboundMessage, MessageChain, MessageComponent, OutboundComponent, OutboundReply,
    },
    gemexp_plugin::GeminiExpPlugin,
    tokio::io::{AsyncBufReadExt, BufReader},
    tracing::{debug, info},
};

/// Input lines that end the session.
const QUIT_COMMANDS: &[&str] = &["/quit", "/exit"];

/// Prints replies to stdout.
pub struct ConsoleSink {
    bot_name: String,
}

impl ConsoleSink {
    pub fn new(bot_name: impl Into<String>) -> Self {
        Self {
            bot_name: bot_name.into(),
        }
    }
}

#[async_trait]
impl ReplySink for ConsoleSink {
    async fn send(&self, reply: OutboundReply) -> gemexp_channels::Result<()> {
        let rendered = render_reply(&self.bot_name, &reply);
        let mut stdout = std::io::stdout().lock();
        stdout
            .write_all(rendered.as_bytes())
            .and_then(|()| stdout.flush())
            .map_err(|e| ChannelError::external("writing to stdout", e))
    }
}

fn render_components(out: &mut String, components: &[OutboundComponent], indent: &str) {
    for component in components {
        match component {
            OutboundComponent::Text { text } => {
                for line in text.lines() {
                    out.push_str(indent);
                    out.push_str(line);
                    out.push('\n');
                }
            },
            OutboundComponent::ImageFile { path } => {
                out.push_str(&format!("{indent}[image] {}\n", path.display()));
            },
        }
    }
}

/// Text rendering of a reply as the console shows it.
pub fn render_reply(bot_name: &str, reply: &OutboundReply) -> String {
    let mut out = String::new();
    match reply {
        OutboundReply::Plain { text } => {
            out.push_str(&format!("{bot_name}: {text}\n"));
        },
        OutboundReply::Chain { components } => {
            out.push_str(&format!("{bot_name}:\n"));
            render_components(&mut out, components, "  ");
        },
        OutboundReply::Forward { nodes } => {
            out.push_str(&format!("{bot_name}: forwarded {} messages\n", nodes.len()));
            for (i, node) in nodes.iter().enumerate() {
                out.push_str(&format!("  ── {} ({}) #{}\n", node.name, node.uin, i + 1));
                render_components(&mut out, &node.content, "    ");
            }
        },
    }
    out
}

/// Parse one typed line into a message chain.
pub fn parse_line(line: &str) -> MessageChain {
    let mut components = Vec::new();
    let mut text = String::new();
    let mut rest = line;

    while let Some(open) = rest.find('[') {
        let (before, tail) = rest.split_at(open);
        text.push_str(before);

        let parsed = tail.find(']').and_then(|close| {
            let inner = &tail[1..close];
            let (kind, source) = inner.split_once(':')?;
            let source = source.trim();
            if source.is_empty() {
                return None;
            }
            let component = match kind.trim() {
                "image" => MessageComponent::image_url(source),
                "quote" => MessageComponent::reply(MessageChain::new(vec![
                    MessageComponent::image_url(source),
                ])),
                _ => return None,
            };
            Some((component, close))
        });

        match parsed {
            Some((component, close)) => {
                flush_text(&mut text, &mut components);
                components.push(component);
                rest = &tail[close + 1..];
            },
            None => {
                text.push('[');
                rest = &tail[1..];
            },
        }
    }
    text.push_str(rest);
    flush_text(&mut text, &mut components);
    MessageChain::new(components)
}

fn flush_text(text: &mut String, components: &mut Vec<MessageComponent>) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        components.push(MessageComponent::plain(trimmed));
    }
    text.clear();
}

/// Read stdin until EOF, a quit command or Ctrl-C, feeding every line to
/// the plugin as a message from `user_id`.
pub async fn run(plugin: &GeminiExpPlugin, user_id: &str, user_name: &str) -> anyhow::Result<()> {
    let sink = ConsoleSink::new(plugin.config().bot_name.clone());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    eprintln!(
        "Type `/{}` to start, then a description and `[image:PATH_OR_URL]`. `/quit` exits.",
        plugin.config().command
    );

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            },
        };
        let Some(line) = line else {
            debug!("stdin closed");
            break;
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if QUIT_COMMANDS.contains(&trimmed) {
            break;
        }

        let msg = InboundMessage::new(user_id, parse_line(trimmed)).with_sender_name(user_name);
        plugin.handle(&msg, &sink).await?;
    }

    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        gemexp_common::types::{ForwardNode, MessageComponent as C},
    };

    #[test]
    fn plain_line_is_one_text_component() {
        assert_eq!(parse_line("make it red").0, vec![C::plain("make it red")]);
    }

    #[test]
    fn image_tokens_split_text() {
        let chain = parse_line("make it [image:https://x/cat.png] red [quote:/tmp/a.png]");
        assert_eq!(chain.0, vec![
            C::plain("make it"),
            C::image_url("https://x/cat.png"),
            C::plain("red"),
            C::reply(MessageChain::new(vec![C::image_url("/tmp/a.png")])),
        ]);
        assert_eq!(chain.plain_text(), "make it red");
    }

    #[test]
    fn unknown_or_unclosed_tokens_stay_text() {
        let chain = parse_line("keep [this] and [image: ] and [image:x");
        assert_eq!(chain.0, vec![C::plain("keep [this] and [image: ] and [image:x")]);
    }

    #[test]
    fn renders_forward_bundles() {
        let reply = OutboundReply::Forward {
            nodes: vec![ForwardNode {
                uin: "114514".into(),
                name: "Gemini Assistant".into(),
                content: vec![
                    OutboundComponent::Text {
                        text: "image 2/2\n\nblue".into(),
                    },
                    OutboundComponent::ImageFile {
                        path: "/tmp/x.png".into(),
                    },
                ],
            }],
        };
        let out = render_reply("bot", &reply);
        assert!(out.starts_with("bot: forwarded 1 messages\n"));
        assert!(out.contains("    image 2/2\n"));
        assert!(out.contains("    blue\n"));
        assert!(out.contains("[image] /tmp/x.png"));
    }

    #[test]
    fn renders_plain_text() {
        assert_eq!(render_reply("bot", &OutboundReply::plain("hi")), "bot: hi\n");
    }
}
