use ratatui::prelude::*;
use ratatui::widgets::*;

use super::{header_lines, HeatFrame};
use crate::config::Config;

fn field_lines(heat: &HeatFrame) -> Vec<Line<'static>> {
    heat.row_cells()
        .map(|row| {
            let spans: Vec<Span> = row
                .iter()
                .map(|cell| {
                    let style = if cell.visible {
                        Style::default().fg(Color::Indexed(cell.color))
                    } else {
                        Style::default()
                    };
                    Span::styled(cell.glyph().to_string(), style)
                })
                .collect();
            Line::from(spans)
        })
        .collect()
}

pub fn render(frame: &mut Frame, heat: &HeatFrame, config: &Config, stamp: &str) {
    let header_height = config.render.header_lines() as u16;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(header_height), // Header
            Constraint::Min(0),                // Field
        ])
        .split(frame.area());

    if config.render.header {
        let [title, legend] = header_lines(config, stamp);
        let header = vec![
            Line::from(Span::styled(
                title,
                Style::default()
                    .fg(Color::Rgb(255, 220, 80))
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(legend, Style::default().fg(Color::Rgb(120, 120, 140)))),
        ];
        frame.render_widget(Paragraph::new(header), chunks[0]);
    }

    let field_area = if config.render.border {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Plain)
            .border_style(Style::default().fg(Color::Rgb(60, 150, 200)));
        let inner = block.inner(chunks[1]);
        frame.render_widget(block, chunks[1]);
        inner
    } else {
        chunks[1]
    };

    if field_area.width > 0 && field_area.height > 0 {
        frame.render_widget(Paragraph::new(field_lines(heat)), field_area);
    }
}
