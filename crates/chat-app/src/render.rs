use murmur_chat::{
    Attachment, Bubble, BubbleVariant, ChatPanel, ConversationKind, PrimaryAction, Receipt,
    RenderedMessage, Row,
};

/// Plain-text projection of one panel: date rows, bubbles and the input field.
pub fn render_panel(panel: &ChatPanel) -> String {
    let kind = match panel.kind() {
        ConversationKind::Direct => "direct",
        ConversationKind::Room => "room",
    };
    let mut lines = vec![format!("== {} ({kind}) ==", panel.conversation_id())];

    for row in panel.view().rows() {
        match row {
            Row::Date(label) => lines.push(format!("-- {label} --")),
            Row::Bubble(bubble) => render_bubble(&mut lines, bubble),
        }
    }

    let scroll = panel.view().scroll();
    lines.push(format!(
        "scroll offset={:.1} content={:.1} viewport={:.1}",
        scroll.offset(),
        scroll.content_height(),
        scroll.viewport_height()
    ));

    let input = panel.input();
    let button = match input.primary_action() {
        PrimaryAction::Send => "send",
        PrimaryAction::Attach => "attach",
    };
    lines.push(format!(
        "input {:?} editing={} button={button} state={:?} sending={}",
        input.text,
        input.editing,
        panel.chat_state(),
        panel.is_sending()
    ));

    let mut output = lines.join("\n");
    output.push('\n');
    output
}

fn render_bubble(lines: &mut Vec<String>, bubble: &Bubble) {
    let side = match bubble.variant {
        BubbleVariant::Own => "me",
        BubbleVariant::Peer => "peer",
    };
    let direction = if bubble.rtl { " rtl" } else { "" };
    lines.push(format!("[{side}{direction}] {} {}", bubble.sender, bubble.label));
    lines.extend(bubble.messages.iter().map(render_message));
}

fn render_message(message: &RenderedMessage) -> String {
    let mut line = String::from("    ");
    if message.quoted {
        line.push_str("> ");
    }

    match (&message.text, &message.attachment) {
        (None, Some(Attachment::Sticker { url, .. })) => {
            line.push_str(&format!("<sticker {url}>"));
        }
        (text, attachment) => {
            let text = text.as_deref().unwrap_or_default();
            if message.quote {
                line.push_str(&format!("* {text}"));
            } else if message.code {
                line.push_str(&format!("`{text}`"));
            } else {
                line.push_str(text);
            }

            match attachment {
                Some(Attachment::File { name, size, .. }) => {
                    line.push_str(&format!(" [file {name} {size}]"));
                }
                Some(Attachment::Audio { mime_type, .. }) => {
                    line.push_str(&format!(" [audio {mime_type}]"));
                }
                Some(Attachment::Sticker { .. }) | None => {}
            }
        }
    }

    if message.edited {
        line.push_str(" (edited)");
    }
    match message.receipt {
        Some(Receipt::Displayed(_)) => line.push_str(" ✓✓"),
        Some(Receipt::Delivered(_)) => line.push_str(" ✓"),
        None => {}
    }

    line.trim_end().to_string()
}
