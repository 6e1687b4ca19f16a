use anyhow::Result;
use ratatui::backend::Backend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{
    Block, Borders, Cell, Clear, List, ListItem, ListState, Paragraph, Row, Table, TableState, Wrap,
};
use ratatui::symbols::line::NORMAL as LINE;
use ratatui::{Frame, Terminal};
// Use Popup from tui-widgets to render modals
use tui_widgets::popup::Popup;

use crate::config::RgbColor;
use crate::editor::{EditorMode, FieldKind, RecordKind};
use crate::lists::ListMode;
use crate::phone::{format_phone, MISSING};

use super::app::{App, ChatRole};
use super::edit::EditTarget;
use super::panes::{FilterField, Screen};

const HELP_MODAL_FOOTER: &str = "j/k: scroll  Esc/q: close";
const ALERT_HELP: &str = "Enter/Esc: close";
const NAMING_HELP: &str = "Type list name  Enter: save  Esc: cancel";
const FILTER_HELP: &str = "Tab: next field  Left/Right/Space: change  Enter/Esc: done";
const SELECTING_HELP: &str = "Space: select  n: name list  Esc: cancel";
const TOURS_HELP: &str = "j/k: nav  Enter: open contact  q/Esc: close";
const VIEW_HELP: &str = "j/k: nav  e: edit  Esc: close";
const EDIT_HELP: &str = "j/k: nav  Enter: change  s: save  Esc: discard";
const FIELD_EDIT_HELP: &str = "Enter: keep  Esc: cancel";
const CHAT_HELP: &str = "Enter: send  Esc: clear  Up/Down: scroll";
const CARD_WIDTH: u16 = 44;

pub fn render<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    terminal.draw(|frame| draw_frame(frame, app))?;
    Ok(())
}

fn draw_frame(frame: &mut Frame<'_>, app: &mut App) {
    let size = frame.area();
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(size);

    draw_header(frame, layout[0], app);
    match app.screen {
        Screen::Chat => draw_chat(frame, layout[1], app),
        Screen::Contacts => draw_contacts(frame, layout[1], app),
        Screen::Listings => draw_listings(frame, layout[1], app),
    }
    draw_footer(frame, layout[2], app);
    draw_tours_modal(frame, size, app);
    draw_detail_modal(frame, size, app);
    draw_naming_modal(frame, size, app);
    draw_alert_modal(frame, size, app);
    draw_help_modal(frame, size, app);
}

// =============================================================================
// Header and footer
// =============================================================================

fn draw_header(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let store_label = format!("STORE://{}", app.store_label());
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(store_label.chars().count() as u16 + 1),
        ])
        .split(area);

    frame.render_widget(Paragraph::new(build_screen_tabs(app)), chunks[0]);
    frame.render_widget(
        Paragraph::new(Span::styled(store_label, header_text_style(app))).alignment(Alignment::Right),
        chunks[1],
    );
}

fn build_screen_tabs(app: &App) -> Line<'static> {
    let global = &app.config().keys.global;
    let mut spans: Vec<Span> = Vec::new();
    for (idx, screen) in Screen::ALL.iter().enumerate() {
        if idx > 0 {
            spans.push(Span::styled(" | ".to_string(), header_text_style(app)));
        }
        let bindings = match screen {
            Screen::Chat => &global.chat,
            Screen::Contacts => &global.contacts,
            Screen::Listings => &global.listings,
        };
        let text = match bindings.first() {
            Some(key) => format!("{}: {}", key, screen.title()),
            None => screen.title().to_string(),
        };
        let style = if *screen == app.screen {
            selection_style(app)
        } else {
            header_text_style(app)
        };
        spans.push(Span::styled(text, style));
    }
    Line::from(spans)
}

fn draw_footer(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let busy = app.busy_labels();
    let message: String = if !busy.is_empty() {
        format!("WORKING: {}...", busy.join(", "))
    } else if app.alert.is_some() {
        ALERT_HELP.to_string()
    } else if let Some(detail) = app.detail.as_ref() {
        if matches!(app.editor.target(), Some(EditTarget::DetailField(_))) {
            FIELD_EDIT_HELP.to_string()
        } else if detail.mode() == EditorMode::Edit {
            EDIT_HELP.to_string()
        } else {
            VIEW_HELP.to_string()
        }
    } else if app.tours_modal.is_some() {
        TOURS_HELP.to_string()
    } else if app.list_builder.mode() == ListMode::Naming {
        NAMING_HELP.to_string()
    } else if let Some(status) = app.status.clone() {
        status
    } else if app.screen == Screen::Contacts && app.filter_focus.is_some() {
        FILTER_HELP.to_string()
    } else if app.screen == Screen::Contacts && app.list_builder.mode() == ListMode::Selecting {
        SELECTING_HELP.to_string()
    } else if app.screen == Screen::Chat {
        CHAT_HELP.to_string()
    } else {
        "READY".to_string()
    };
    let colors = app.ui_colors();
    let style = Style::default()
        .fg(color(colors.status_fg))
        .bg(color(colors.status_bg));

    let background = Block::default().style(Style::default().bg(color(colors.status_bg)));
    frame.render_widget(background, area);

    frame.render_widget(Paragraph::new(message).style(style), area);
}

// =============================================================================
// Contacts screen
// =============================================================================

fn draw_contacts(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);
    draw_filter_bar(frame, rows[0], app);

    let card_width = CARD_WIDTH.min(rows[1].width / 2);
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(card_width)])
        .split(rows[1]);
    draw_contact_table(frame, columns[0], app);
    draw_contact_card(frame, columns[1], app);
}

fn draw_filter_bar(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let active = app.filter_focus.is_some();
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(app, active))
        .title(Span::styled(" FILTER ", header_text_style(app)));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.width == 0 || inner.height == 0 {
        return;
    }

    let mut spans: Vec<Span> = Vec::new();
    let mut cursor = None;
    let mut column = 0usize;
    for (idx, field) in FilterField::ALL.iter().enumerate() {
        if idx > 0 {
            spans.push(Span::raw("  "));
            column += 2;
        }
        let label = format!("{}: ", field.label());
        column += Span::raw(&label).width();
        spans.push(Span::styled(label, header_text_style(app)));

        let focused = app.filter_focus == Some(*field);
        let value = match field {
            FilterField::Sector => {
                if app.filter.business_sector.is_empty() {
                    "All".to_string()
                } else {
                    app.filter.business_sector.clone()
                }
            }
            FilterField::Company => app.filter.company.clone(),
            FilterField::Notes => app.filter.notes.clone(),
            FilterField::Linkedin => app.filter.linkedin.label().to_string(),
        };
        if focused && field.is_text() {
            cursor = Some(column + app.editor.visual_cursor());
        }
        // Keep an empty focused text field visible.
        let shown = if value.is_empty() && !focused { "-".to_string() } else { value };
        column += Span::raw(&shown).width();
        let style = if focused {
            selection_style(app)
        } else {
            Style::default()
        };
        spans.push(Span::styled(shown, style));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), inner);
    if let Some(column) = cursor {
        frame.set_cursor_position((inner.x.saturating_add(column as u16), inner.y));
    }
}

fn draw_contact_table(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let total = app.directory.len();
    let shown = app.visible.len();
    let mut title = if app.filter.is_active() {
        format!(" CONTACTS {}/{} ", shown, total)
    } else {
        format!(" CONTACTS {} ", total)
    };
    let list_mode = app.list_builder.mode() != ListMode::Browsing;
    if list_mode {
        title.push_str(&format!("| LIST: {} SELECTED ", app.list_builder.selected().len()));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(app, app.filter_focus.is_none()))
        .title(Span::styled(title, header_text_style(app)));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.width == 0 || inner.height == 0 {
        return;
    }

    let inner = match app.contacts_error.as_ref() {
        Some(err) => match draw_load_error(frame, inner, app, &err.message, total > 0) {
            Some(rest) => rest,
            None => return,
        },
        None => inner,
    };
    if app.visible.is_empty() {
        let message = if total == 0 {
            "No contacts"
        } else {
            "No contacts match the current filters"
        };
        render_centered_words(frame, inner, message);
        return;
    }

    let region = app.phone_region();
    let marked_style = Style::default().fg(color(app.ui_colors().marked));
    let rows: Vec<Row> = app
        .visible_contacts()
        .map(|contact| {
            let mut cells: Vec<Cell> = Vec::with_capacity(6);
            if list_mode {
                let marker = if app.list_builder.is_selected(&contact.id) {
                    Cell::from("[x]").style(marked_style)
                } else {
                    Cell::from("[ ]")
                };
                cells.push(marker);
            }
            cells.push(Cell::from(contact.display_name.clone()));
            cells.push(Cell::from(or_missing(contact.company.as_deref())));
            cells.push(Cell::from(or_missing(contact.business_sector.as_deref())));
            cells.push(Cell::from(or_missing(contact.email.as_deref())));
            cells.push(Cell::from(format_phone(contact.phone.as_deref(), region)));
            Row::new(cells)
        })
        .collect();

    let mut widths: Vec<Constraint> = Vec::with_capacity(6);
    let mut headers: Vec<&str> = Vec::with_capacity(6);
    if list_mode {
        widths.push(Constraint::Length(3));
        headers.push("");
    }
    widths.extend([
        Constraint::Percentage(24),
        Constraint::Percentage(20),
        Constraint::Percentage(14),
        Constraint::Percentage(24),
        Constraint::Percentage(18),
    ]);
    headers.extend(["NAME", "COMPANY", "SECTOR", "EMAIL", "PHONE"]);

    let table = Table::new(rows, widths)
        .header(Row::new(headers).style(header_text_style(app)))
        .highlight_style(selection_style(app));

    let mut state = TableState::default();
    state.select(Some(app.selected));
    frame.render_stateful_widget(table, inner, &mut state);
}

/// Show a failed load. With rows still on hand the message takes one line
/// above them and the remaining area is returned; otherwise it fills `area`.
fn draw_load_error(frame: &mut Frame<'_>, area: Rect, app: &App, message: &str, has_rows: bool) -> Option<Rect> {
    let style = Style::default().fg(color(app.ui_colors().error));
    if !has_rows {
        let para = Paragraph::new(message.to_string())
            .style(style)
            .wrap(Wrap { trim: true });
        frame.render_widget(para, area);
        return None;
    }

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(0)])
        .split(area);
    frame.render_widget(Paragraph::new(message.to_string()).style(style), layout[0]);
    Some(layout[1])
}

fn draw_contact_card(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(app, false));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.width == 0 || inner.height == 0 {
        return;
    }

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(2), Constraint::Min(0)])
        .split(inner);

    let Some(contact) = app.selected_contact() else {
        let header = Line::from(Span::styled("NO CONTACT SELECTED", header_text_style(app)));
        render_header_with_separator(frame, layout[0], header, app, None, area.width);
        return;
    };

    let header = Line::from(Span::styled(
        contact.display_name.to_uppercase(),
        header_text_style(app),
    ));
    render_header_with_separator(frame, layout[0], header, app, None, area.width);

    let fields: Vec<(&str, String)> = vec![
        ("Company", or_missing(contact.company.as_deref())),
        ("Sector", or_missing(contact.business_sector.as_deref())),
        ("Email", or_missing(contact.email.as_deref())),
        ("Phone", format_phone(contact.phone.as_deref(), app.phone_region())),
        ("Address", or_missing(contact.address.as_deref())),
        ("LinkedIn", or_missing(contact.linkedin.as_deref())),
        ("Added", contact.added_on().unwrap_or_else(|| MISSING.to_string())),
    ];
    let mut lines = field_lines(app, &fields);
    if let Some(notes) = contact.notes.as_deref().filter(|n| !n.trim().is_empty()) {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled("Notes:", header_text_style(app))));
        lines.extend(notes.lines().map(|l| Line::from(l.to_string())));
    }

    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), layout[1]);
}

// =============================================================================
// Listings screen
// =============================================================================

fn draw_listings(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let card_width = CARD_WIDTH.min(area.width / 2);
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(card_width)])
        .split(area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(app, true))
        .title(Span::styled(
            format!(" LISTINGS {} ", app.listings.len()),
            header_text_style(app),
        ));
    let inner = block.inner(columns[0]);
    frame.render_widget(block, columns[0]);

    let inner = match app.listings_error.as_ref() {
        Some(err) if inner.width > 0 && inner.height > 0 => {
            draw_load_error(frame, inner, app, &err.message, !app.listings.is_empty())
                .unwrap_or_default()
        }
        _ => inner,
    };

    if inner.width > 0 && inner.height > 0 {
        if app.listings.is_empty() {
            render_centered_words(frame, inner, "No listings");
        } else {
            let items: Vec<ListItem> = app
                .listings
                .listings()
                .iter()
                .map(|listing| {
                    let locality = listing.locality();
                    let mut spans = vec![Span::raw(listing.title().to_string())];
                    if !locality.is_empty() {
                        spans.push(Span::styled(format!("  {}", locality), header_text_style(app)));
                    }
                    ListItem::new(Line::from(spans))
                })
                .collect();

            let mut state = ListState::default();
            state.select(Some(app.listing_selected));
            let list = List::new(items)
                .highlight_style(selection_style(app))
                .highlight_symbol(" ")
                .repeat_highlight_symbol(false);
            frame.render_stateful_widget(list, inner, &mut state);
        }
    }

    draw_listing_card(frame, columns[1], app);
}

fn draw_listing_card(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(app, false));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.width == 0 || inner.height == 0 {
        return;
    }

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(2), Constraint::Min(0)])
        .split(inner);

    let Some(listing) = app.selected_listing() else {
        let header = Line::from(Span::styled("NO LISTING SELECTED", header_text_style(app)));
        render_header_with_separator(frame, layout[0], header, app, None, area.width);
        return;
    };

    let header = Line::from(Span::styled(listing.title().to_uppercase(), header_text_style(app)));
    render_header_with_separator(frame, layout[0], header, app, None, area.width);

    let locality = listing.locality();
    let fields: Vec<(&str, String)> = vec![
        ("Location", if locality.is_empty() { MISSING.to_string() } else { locality }),
        ("SF available", or_missing(listing.sf_available.as_deref())),
        ("Lease/sale", or_missing(listing.lease_or_sale.as_deref())),
        ("Price per SF", or_missing(listing.price_per_sf.as_deref())),
        ("Contact lists", listing.contact_list_ids.len().to_string()),
    ];
    frame.render_widget(
        Paragraph::new(field_lines(app, &fields)).wrap(Wrap { trim: false }),
        layout[1],
    );
}

// =============================================================================
// Chat screen
// =============================================================================

fn draw_chat(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)])
        .split(area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(app, false))
        .title(Span::styled(" ASSISTANT ", header_text_style(app)));
    let inner = block.inner(rows[0]);
    frame.render_widget(block, rows[0]);

    let colors = app.ui_colors();
    let mut lines: Vec<Line> = Vec::new();
    for entry in &app.chat.transcript {
        let (label, style) = match entry.role {
            ChatRole::User => ("YOU", header_text_style(app)),
            ChatRole::Assistant => ("ASSISTANT", selection_style(app)),
            ChatRole::Action => ("ACTION", Style::default().fg(color(colors.marked))),
            ChatRole::Error => ("ERROR", Style::default().fg(color(colors.error))),
        };
        lines.push(Line::from(Span::styled(label, style.add_modifier(Modifier::BOLD))));
        lines.extend(entry.text.lines().map(|l| Line::from(l.to_string())));
        lines.push(Line::from(""));
    }
    if app.chat.pending {
        lines.push(Line::from(Span::styled("...", header_text_style(app))));
    }

    if inner.width > 0 && inner.height > 0 {
        if lines.is_empty() {
            render_centered_words(frame, inner, "Ask about your contacts and listings");
        } else {
            let total = wrapped_height(&lines, inner.width);
            let bottom = total.saturating_sub(inner.height as usize);
            let offset = bottom.saturating_sub(app.chat.scroll_back as usize);
            let para = Paragraph::new(lines)
                .wrap(Wrap { trim: false })
                .scroll((offset.min(u16::MAX as usize) as u16, 0));
            frame.render_widget(para, inner);
        }
    }

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(app, true))
        .title(Span::styled(" MESSAGE ", header_text_style(app)));
    let input_inner = input_block.inner(rows[1]);
    frame.render_widget(input_block, rows[1]);

    if input_inner.width == 0 || input_inner.height == 0 {
        return;
    }

    if let Some(error) = app.chat.error.as_ref().filter(|_| app.chat.input.value().is_empty()) {
        let para = Paragraph::new(error.clone()).style(Style::default().fg(color(colors.error)));
        frame.render_widget(para, input_inner);
    } else {
        // Keep the cursor in view on long input.
        let width = input_inner.width.saturating_sub(1) as usize;
        let scroll = app.chat.input.visual_scroll(width);
        let para = Paragraph::new(app.chat.input.value().to_string()).scroll((0, scroll as u16));
        frame.render_widget(para, input_inner);
    }
    if app.alert.is_none() && app.help_modal.is_none() {
        let width = input_inner.width.saturating_sub(1) as usize;
        let scroll = app.chat.input.visual_scroll(width);
        let column = app.chat.input.visual_cursor().saturating_sub(scroll);
        frame.set_cursor_position((input_inner.x.saturating_add(column as u16), input_inner.y));
    }
}

/// Rows a wrapped paragraph of `lines` takes at `width`.
fn wrapped_height(lines: &[Line], width: u16) -> usize {
    let width = width.max(1) as usize;
    lines
        .iter()
        .map(|line| line.width().max(1).div_ceil(width))
        .sum()
}

// =============================================================================
// Modals
// =============================================================================

fn draw_detail_modal(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let Some(detail) = app.detail.as_ref() else {
        return;
    };

    let width = area.width.saturating_mul(2).saturating_div(3).max(50).min(area.width);
    let height = (detail.specs().len() as u16 + 4).min(area.height);
    let modal_area = centered(area, width, height);
    frame.render_widget(Clear, modal_area);

    let kind = match detail.kind() {
        RecordKind::Contact => "CONTACT",
        RecordKind::Listing => "LISTING",
    };
    let mode = match detail.mode() {
        EditorMode::View => "VIEW",
        EditorMode::Edit if detail.is_dirty() => "EDIT*",
        EditorMode::Edit => "EDIT",
    };
    let title = Line::from(vec![
        Span::styled(format!(" {}: {} ", kind, detail.title().to_uppercase()), header_text_style(app)),
        Span::styled(format!("[{}] ", mode), selection_style(app)),
    ]);
    let footer = if app.detail_saving {
        " SAVING... "
    } else if detail.mode() == EditorMode::Edit {
        " Enter: change  s: save  Esc: discard "
    } else {
        " e: edit  Esc: close "
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(app, true))
        .title(title)
        .title_bottom(Span::styled(footer, header_text_style(app)))
        .title_alignment(Alignment::Center);
    let inner = block.inner(modal_area);
    frame.render_widget(block, modal_area);

    if inner.width == 0 || inner.height == 0 {
        return;
    }

    let label_width = detail
        .specs()
        .iter()
        .map(|spec| spec.label.len() + 1)
        .max()
        .unwrap_or(0);

    let mut lines: Vec<Line> = Vec::new();
    let mut cursor = None;
    for (idx, (spec, value)) in detail.fields().enumerate() {
        let highlight = idx == detail.selected();
        let editing = app.editor.is_editing(EditTarget::DetailField(idx));
        let (label_style, value_style) = line_styles(app, highlight || editing);
        let label = format!("{:width$} ", format!("{}:", spec.label), width = label_width);

        let shown = if editing {
            cursor = Some((idx, Span::raw(&label).width() + app.editor.visual_cursor()));
            app.editor.value().to_string()
        } else if value.is_empty() {
            match spec.kind {
                FieldKind::Choice(_) => "(none)".to_string(),
                _ => String::new(),
            }
        } else if matches!(spec.kind, FieldKind::Multiline) {
            value.replace('\n', " / ")
        } else {
            value.to_string()
        };

        lines.push(Line::from(vec![
            Span::styled(label, label_style),
            Span::styled(shown, value_style),
        ]));
    }

    frame.render_widget(Paragraph::new(lines), inner);

    if let Some((line_idx, column)) = cursor {
        let x = inner.x.saturating_add(column as u16);
        let y = inner.y.saturating_add(line_idx as u16);
        frame.set_cursor_position((x, y));
    }
}

fn draw_tours_modal(frame: &mut Frame<'_>, area: Rect, app: &App) {
    let Some(modal) = app.tours_modal.as_ref() else {
        return;
    };

    let width = area.width.saturating_mul(2).saturating_div(3).max(40).min(area.width);
    let height = area.height.saturating_mul(3).saturating_div(5).max(8).min(area.height);
    let modal_area = centered(area, width, height);
    frame.render_widget(Clear, modal_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(app, true))
        .title(Span::styled(
            format!(" TOURS: {} ", modal.listing_title.to_uppercase()),
            header_text_style(app),
        ))
        .title_bottom(Span::styled(format!(" {} ", TOURS_HELP), header_text_style(app)))
        .title_alignment(Alignment::Center);
    let inner = block.inner(modal_area);
    frame.render_widget(block, modal_area);

    if inner.width == 0 || inner.height == 0 {
        return;
    }

    if modal.loading {
        render_centered_words(frame, inner, "Loading tours");
        return;
    }
    if let Some(error) = modal.error.as_ref() {
        let para = Paragraph::new(error.clone())
            .style(Style::default().fg(color(app.ui_colors().error)))
            .wrap(Wrap { trim: true });
        frame.render_widget(para, inner);
        return;
    }
    if modal.tours.is_empty() {
        render_centered_words(frame, inner, "No tours recorded");
        return;
    }

    let items: Vec<ListItem> = modal
        .tours
        .iter()
        .map(|tour| {
            let date = tour
                .timestamp
                .as_deref()
                .and_then(|t| t.get(..10))
                .unwrap_or(MISSING)
                .to_string();
            let notes = tour
                .notes
                .as_deref()
                .map(|n| n.replace('\n', " "))
                .unwrap_or_default();
            ListItem::new(Line::from(vec![
                Span::styled(format!("{:<12}", date), header_text_style(app)),
                Span::raw(notes),
            ]))
        })
        .collect();

    let mut state = ListState::default();
    state.select(Some(modal.selected));
    let list = List::new(items)
        .highlight_style(selection_style(app))
        .highlight_symbol(" ")
        .repeat_highlight_symbol(false);
    frame.render_stateful_widget(list, inner, &mut state);
}

fn draw_naming_modal(frame: &mut Frame<'_>, area: Rect, app: &mut App) {
    if app.list_builder.mode() != ListMode::Naming || app.detail.is_some() {
        return;
    }

    let label = "LIST NAME: ";
    let value = app.editor.value().to_string();
    let min_width = area.width.saturating_mul(2).saturating_div(3).min(60) as usize;
    let padded = format!("{:<width$}", value, width = min_width.saturating_sub(label.len()));
    let count = app.list_builder.selected().len();
    let lines = vec![
        Line::from(vec![
            Span::styled(label, header_text_style(app)),
            Span::raw(padded),
        ]),
        Line::from(format!("{} contacts selected", count)),
        Line::from(""),
        Line::from(if app.list_saving { "Saving..." } else { NAMING_HELP }),
    ];

    let title_line = Line::from(Span::styled("CREATE LIST", header_text_style(app)));
    let popup = Popup::new(Text::from(lines))
        .title(title_line)
        .border_style(border_style(app, true));

    frame.render_stateful_widget_ref(popup, area, &mut app.modal_popup);

    if app.alert.is_some() || app.help_modal.is_some() {
        return;
    }
    if let Some(area) = app.modal_popup.area() {
        let inner = Block::default().borders(Borders::ALL).inner(*area);
        let x = inner
            .x
            .saturating_add(label.len() as u16 + app.editor.visual_cursor() as u16);
        frame.set_cursor_position((x, inner.y));
    }
}

fn draw_alert_modal(frame: &mut Frame<'_>, area: Rect, app: &mut App) {
    let Some(alert) = app.alert.as_ref() else {
        return;
    };

    let mut lines: Vec<Line> = alert
        .message
        .lines()
        .map(|l| Line::from(l.to_string()))
        .collect();
    lines.push(Line::from(""));
    lines.push(Line::from(ALERT_HELP));

    let title_line = Line::from(Span::styled(alert.title.to_uppercase(), header_text_style(app)));
    let popup = Popup::new(Text::from(lines))
        .title(title_line)
        .border_style(Style::default().fg(color(app.ui_colors().error)));

    frame.render_stateful_widget_ref(popup, area, &mut app.modal_popup);
}

fn draw_help_modal(frame: &mut Frame<'_>, area: Rect, app: &mut App) {
    if app.help_modal.is_none() {
        return;
    }

    // Calculate modal size: 2/3 width, 80% height
    let width = area.width.saturating_mul(2).saturating_div(3).max(40).min(area.width);
    let height = area.height.saturating_mul(4).saturating_div(5).max(10).min(area.height);
    let modal_area = centered(area, width, height);

    // Clear the area behind the modal
    frame.render_widget(Clear, modal_area);

    // Get styles before any mutable borrows
    let header_style = header_text_style(app);
    let border_s = border_style(app, true);

    let sections = app.help_entries();
    let mut lines: Vec<Line> = Vec::new();

    let content_width = width.saturating_sub(4) as usize;
    let action_width = 20usize;

    for (section_idx, section) in sections.iter().enumerate() {
        let header_text = format!(" {} ", section.title);
        let padding_total = content_width.saturating_sub(header_text.len());
        let left_pad = padding_total / 2;
        let right_pad = padding_total - left_pad;
        let header_line = format!(
            "{}{}{}",
            LINE.horizontal.to_string().repeat(left_pad),
            header_text,
            LINE.horizontal.to_string().repeat(right_pad)
        );
        lines.push(Line::from(Span::styled(header_line, header_style)));

        for entry in &section.entries {
            let action = format!("{:<width$}", entry.action, width = action_width);
            lines.push(Line::from(vec![
                Span::styled(action, Style::default()),
                Span::styled(entry.keys.clone(), header_style),
            ]));
        }

        if section_idx < sections.len() - 1 {
            lines.push(Line::from(""));
        }
    }

    let total_lines = lines.len();
    // borders (2) + footer line (1)
    let inner_height = height.saturating_sub(3) as usize;

    let Some(modal) = app.help_modal.as_mut() else {
        return;
    };
    modal.total_lines = total_lines;
    modal.viewport_height = inner_height;

    let max_scroll = modal.total_lines.saturating_sub(modal.viewport_height);
    if modal.scroll > max_scroll {
        modal.scroll = max_scroll;
    }

    let scroll = modal.scroll;
    let viewport_height = modal.viewport_height;
    let scroll_indicator = match (modal.can_scroll_up(), modal.can_scroll_down()) {
        (true, true) => "▲▼",
        (true, false) => "▲ ",
        (false, true) => " ▼",
        (false, false) => "  ",
    };

    let visible_lines: Vec<Line> = lines
        .into_iter()
        .skip(scroll)
        .take(viewport_height)
        .collect();

    let title = Line::from(vec![
        Span::styled(" HELP ", header_style),
        Span::styled(scroll_indicator, header_style),
    ]);
    let footer = Line::from(Span::styled(format!(" {} ", HELP_MODAL_FOOTER), header_style));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_s)
        .title(title)
        .title_bottom(footer)
        .title_alignment(Alignment::Center);

    let inner = block.inner(modal_area);
    frame.render_widget(block, modal_area);
    frame.render_widget(Paragraph::new(visible_lines), inner);
}

// =============================================================================
// Helpers
// =============================================================================

fn field_lines(app: &App, fields: &[(&str, String)]) -> Vec<Line<'static>> {
    let label_width = fields.iter().map(|(label, _)| label.len() + 1).max().unwrap_or(0);
    fields
        .iter()
        .map(|(label, value)| {
            let (label_style, value_style) = line_styles(app, false);
            Line::from(vec![
                Span::styled(
                    format!("{:width$} ", format!("{}:", label), width = label_width),
                    label_style,
                ),
                Span::styled(value.clone(), value_style),
            ])
        })
        .collect()
}

fn or_missing(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => MISSING.to_string(),
    }
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

fn line_styles(app: &App, highlight: bool) -> (Style, Style) {
    if highlight {
        let style = selection_style(app);
        (style, style)
    } else {
        (header_text_style(app), Style::default())
    }
}

fn selection_style(app: &App) -> Style {
    let colors = app.ui_colors();
    Style::default()
        .fg(color(colors.selection_fg))
        .bg(color(colors.selection_bg))
}

fn border_style(app: &App, active: bool) -> Style {
    let colors = app.ui_colors();
    let style = Style::default().fg(color(colors.border));
    if active {
        style
    } else {
        style.add_modifier(Modifier::DIM)
    }
}

fn header_text_style(app: &App) -> Style {
    let colors = app.ui_colors();
    Style::default().fg(color(colors.separator))
}

fn separator_style(app: &App) -> Style {
    let colors = app.ui_colors();
    Style::default().fg(color(colors.separator))
}

fn render_centered_words(frame: &mut Frame<'_>, area: Rect, text: &str) {
    if area.width == 0 || area.height == 0 {
        return;
    }

    let mut lines: Vec<Line> = text
        .split_whitespace()
        .map(|word| Line::from(word.to_string()))
        .collect();

    if lines.is_empty() {
        return;
    }

    if lines.len() as u16 > area.height {
        lines.truncate(area.height as usize);
    }

    let height = lines.len() as u16;
    let start_y = area.y + (area.height.saturating_sub(height)) / 2;
    let target = Rect {
        x: area.x,
        y: start_y,
        width: area.width,
        height,
    };

    frame.render_widget(Paragraph::new(lines).alignment(Alignment::Center), target);
}

/// Render a header line with a separator below it.
/// `area` is the inner content area for the header.
/// `outer_width` is the full pane width (including borders) for drawing connected separators.
fn render_header_with_separator(
    frame: &mut Frame<'_>,
    area: Rect,
    content: Line<'static>,
    app: &App,
    style: Option<Style>,
    outer_width: u16,
) {
    if area.width == 0 || area.height == 0 {
        return;
    }

    let paragraph = match style {
        Some(style) => Paragraph::new(content).style(style),
        None => Paragraph::new(content),
    };

    if area.height == 1 {
        frame.render_widget(paragraph, area);
        return;
    }

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1)])
        .split(area);

    frame.render_widget(paragraph, layout[0]);

    // Build separator with connector characters: ├───┤
    let inner_width = outer_width.saturating_sub(2) as usize;
    let separator = format!(
        "{}{}{}",
        LINE.vertical_right,
        LINE.horizontal.to_string().repeat(inner_width),
        LINE.vertical_left
    );
    let separator_line = Line::from(Span::styled(separator, separator_style(app)));

    // Shifted left by 1 to start at the border
    let separator_area = Rect {
        x: layout[1].x.saturating_sub(1),
        y: layout[1].y,
        width: outer_width,
        height: 1,
    };
    frame.render_widget(Paragraph::new(separator_line), separator_area);
}

fn color(rgb: RgbColor) -> Color {
    Color::Rgb(rgb.r, rgb.g, rgb.b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapped_height() {
        let lines = vec![Line::from("abcdef"), Line::from(""), Line::from("abc")];
        assert_eq!(wrapped_height(&lines, 3), 4);
        assert_eq!(wrapped_height(&lines, 10), 3);
    }

    #[test]
    fn test_or_missing() {
        assert_eq!(or_missing(None), "N/A");
        assert_eq!(or_missing(Some("  ")), "N/A");
        assert_eq!(or_missing(Some(" Acme ")), "Acme");
    }

    #[test]
    fn test_centered() {
        let area = Rect::new(0, 0, 100, 40);
        assert_eq!(centered(area, 50, 10), Rect::new(25, 15, 50, 10));
    }
}
