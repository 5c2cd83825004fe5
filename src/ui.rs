use ratatui::Frame;
use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Row, Table, Widget};

use crate::app::App;
use crate::cycle::{CycleOutcome, CyclePhase};
use crate::dashboard::{
    CandlePoint, ChartSpec, Dashboard, LineTrace, MetricTile, PAGE_TITLE, TABLE_TITLE, TableView,
    TraceColor, Trend,
};
use crate::model::Interval;

const ORANGE: Color = Color::Rgb(255, 165, 0);

fn trace_color(color: TraceColor) -> Color {
    match color {
        TraceColor::Orange => ORANGE,
        TraceColor::Blue => Color::Blue,
        TraceColor::Gray => Color::Gray,
    }
}

pub fn draw(f: &mut Frame<'_>, app: &App) {
    let dashboard = match app.outcome() {
        Some(CycleOutcome::Rendered(rendered)) => Some(&rendered.dashboard),
        _ => None,
    };
    let table_height = dashboard.map_or(0, |d| d.table.rows.len() as u16 + 3);

    let v = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),            // title + key help
            Constraint::Length(1),            // status / banner / ticker input
            Constraint::Length(4),            // metric tiles
            Constraint::Min(8),               // chart
            Constraint::Length(table_height), // latest data
            Constraint::Length(1),            // countdown
        ])
        .split(f.area());

    f.render_widget(header(app), v[0]);
    f.render_widget(status_line(app), v[1]);

    match dashboard {
        Some(d) => {
            draw_tiles(f, v[2], &d.metrics.tiles());
            draw_chart(f, v[3], &d.chart, app.params().interval);
            draw_table(f, v[4], &d.table);
        }
        None => {
            f.render_widget(Block::default().borders(Borders::ALL), v[3]);
        }
    }

    if let Some(countdown) = app.countdown() {
        f.render_widget(
            Paragraph::new(Line::from(Span::styled(
                countdown.label(),
                Style::default().add_modifier(Modifier::BOLD),
            ))),
            v[5],
        );
    }
}

fn header(app: &App) -> Paragraph<'static> {
    let params = app.params();
    Paragraph::new(Line::from(vec![
        Span::styled(
            format!("📈 {PAGE_TITLE}  "),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw("| Ticker: "),
        Span::styled(params.ticker.clone(), Style::default().fg(Color::Cyan)),
        Span::raw(format!(
            "  Refresh: {}  {}/{}  ",
            params.refresh, params.period, params.interval
        )),
        Span::styled(
            "| t=ticker +/-=rate r=refresh q=quit",
            Style::default().fg(Color::DarkGray),
        ),
    ]))
}

fn status_line(app: &App) -> Paragraph<'static> {
    if let Some(input) = app.input() {
        return Paragraph::new(Line::from(vec![
            Span::styled(
                "Enter Stock Symbol (e.g. AAPL, TSLA, INFY.NS): ",
                Style::default().fg(Color::Yellow),
            ),
            Span::raw(input.to_uppercase()),
            Span::styled("█", Style::default().fg(Color::Yellow)),
        ]));
    }
    let line = match app.outcome() {
        Some(CycleOutcome::Empty { warning }) => {
            Line::from(Span::styled(warning.clone(), Style::default().fg(Color::Yellow)))
        }
        Some(CycleOutcome::Failed { message }) => {
            Line::from(Span::styled(message.clone(), Style::default().fg(Color::Red)))
        }
        _ if app.phase() == CyclePhase::Fetching => Line::from(Span::styled(
            format!("Fetching {}...", app.params().ticker),
            Style::default().fg(Color::DarkGray),
        )),
        _ => Line::default(),
    };
    Paragraph::new(line)
}

fn draw_tiles(f: &mut Frame<'_>, area: Rect, tiles: &[MetricTile]) {
    let h = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(vec![Constraint::Ratio(1, tiles.len() as u32); tiles.len()])
        .split(area);

    for (tile, cell) in tiles.iter().zip(h.iter()) {
        let mut lines = vec![Line::from(Span::styled(
            tile.value.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        ))];
        if let Some(delta) = &tile.delta {
            let color = match tile.trend {
                Trend::Up => Color::Green,
                Trend::Down => Color::Red,
                Trend::Flat => Color::Gray,
            };
            lines.push(Line::from(Span::styled(
                delta.clone(),
                Style::default().fg(color),
            )));
        }
        let widget = Paragraph::new(lines).block(
            Block::default()
                .title(format!(" {} ", tile.label))
                .borders(Borders::ALL),
        );
        f.render_widget(widget, *cell);
    }
}

fn draw_chart(f: &mut Frame<'_>, area: Rect, chart: &ChartSpec, interval: Interval) {
    let block = Block::default().borders(Borders::ALL);
    let inner = block.inner(area);

    let inner_v = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(inner);
    let chart_area = inner_v[0];
    let axis_area = inner_v[1];

    let view = ChartView::new(chart, chart_area.width as usize);

    let mut title = vec![
        Span::styled(
            format!(" {} ", chart.title),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::styled("■ Price ", Style::default().fg(Color::Green)),
    ];
    for (trace, _) in &view.overlays {
        title.push(Span::styled(
            format!("■ {} ", trace.name),
            Style::default().fg(trace_color(trace.color)),
        ));
    }
    f.render_widget(block.title(Line::from(title)), area);

    if let (Some(first), Some(last)) = (view.candles.first(), view.candles.last()) {
        let (from_fmt, to_fmt) = if interval.is_intraday() {
            ("%Y-%m-%d %H:%M", "%H:%M")
        } else {
            ("%Y-%m-%d", "%Y-%m-%d")
        };
        let axis = Line::from(format!(
            "{}  →  {}   y:[{:.2}, {:.2}]   N={}",
            first.timestamp.format(from_fmt),
            last.timestamp.format(to_fmt),
            view.y_min,
            view.y_max,
            view.candles.len()
        ));
        f.render_widget(Paragraph::new(axis), axis_area);
    }
    f.render_widget(view, chart_area);
}

fn draw_table(f: &mut Frame<'_>, area: Rect, table: &TableView) {
    let widths: Vec<Constraint> = table
        .headers
        .iter()
        .enumerate()
        .map(|(i, header)| {
            let widest = table
                .rows
                .iter()
                .filter_map(|r| r.get(i))
                .map(|c| c.chars().count())
                .max()
                .unwrap_or(0)
                .max(header.chars().count());
            Constraint::Length(widest as u16)
        })
        .collect();

    let header = Row::new(table.headers.clone())
        .style(Style::default().add_modifier(Modifier::BOLD));
    let rows = table.rows.iter().map(|r| Row::new(r.clone()));

    let widget = Table::new(rows, widths).header(header).block(
        Block::default()
            .title(format!(" 📊 {TABLE_TITLE} "))
            .borders(Borders::ALL),
    );
    f.render_widget(widget, area);
}

/// The visible tail of a chart: as many candles as there are columns, and
/// the overlays that have at least one value inside that window.
struct ChartView<'a> {
    candles: &'a [CandlePoint],
    overlays: Vec<(&'a LineTrace, &'a [Option<f64>])>,
    y_min: f64,
    y_max: f64,
}

impl<'a> ChartView<'a> {
    fn new(chart: &'a ChartSpec, width: usize) -> Self {
        let start = chart.candles.len().saturating_sub(width.max(1));
        let candles = &chart.candles[start..];
        let overlays: Vec<_> = chart
            .overlays
            .iter()
            .filter_map(|o| {
                let values = o.values.get(start..)?;
                values.iter().any(Option::is_some).then_some((o, values))
            })
            .collect();

        let lows = candles
            .iter()
            .map(|c| c.low)
            .chain(overlays.iter().flat_map(|(_, v)| v.iter().flatten().copied()));
        let highs = candles
            .iter()
            .map(|c| c.high)
            .chain(overlays.iter().flat_map(|(_, v)| v.iter().flatten().copied()));
        let lo = lows.fold(f64::MAX, f64::min);
        let hi = highs.fold(f64::MIN, f64::max);
        let span = (hi - lo).max(1e-3);
        let pad = span * 0.05;

        Self {
            candles,
            overlays,
            y_min: lo - pad,
            y_max: hi + pad,
        }
    }
}

impl Widget for ChartView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if self.candles.is_empty() || area.width == 0 || area.height == 0 {
            return;
        }

        let height = area.height as i32;
        let span = (self.y_max - self.y_min).max(1e-6);
        let y_min = self.y_min;

        let map_price_to_row = |price: f64| -> i32 {
            let ratio = ((price - y_min) / span).clamp(0.0, 1.0);
            let rel = (ratio * (height as f64 - 1.0)).round() as i32;
            (area.y as i32 + (height - 1)) - rel
        };

        let row_min = area.y as i32;
        let row_max = area.y as i32 + area.height as i32 - 1;

        // horizontal grid lines
        let grid_lines = 4;
        for i in 0..=grid_lines {
            let price = y_min + (span * i as f64 / grid_lines as f64);
            let row = map_price_to_row(price).clamp(row_min, row_max);
            for x in area.x..(area.x + area.width) {
                if let Some(cell) = buf.cell_mut((x, row as u16)) {
                    if cell.symbol() == " " {
                        cell.set_symbol("─").set_fg(Color::DarkGray);
                    }
                }
            }
        }

        // candles (wick + body), 1 column per candle
        for (i, c) in self.candles.iter().enumerate().take(area.width as usize) {
            let x = area.x + i as u16;
            let color = if c.close >= c.open {
                Color::Green
            } else {
                Color::Red
            };

            let low_row = map_price_to_row(c.low);
            let high_row = map_price_to_row(c.high);
            let open_row = map_price_to_row(c.open);
            let close_row = map_price_to_row(c.close);

            let wick_start = low_row.min(high_row).max(row_min);
            let wick_end = low_row.max(high_row).min(row_max);
            let body_start = open_row.min(close_row).max(row_min);
            let body_end = open_row.max(close_row).min(row_max);

            for y in wick_start..=wick_end {
                if let Some(cell) = buf.cell_mut((x, y as u16)) {
                    cell.set_symbol("│").set_fg(color);
                }
            }
            for y in body_start..=body_end {
                if let Some(cell) = buf.cell_mut((x, y as u16)) {
                    cell.set_symbol("█").set_fg(color);
                }
            }
        }

        // overlays on top of the candles
        for (trace, values) in &self.overlays {
            let color = trace_color(trace.color);
            for (i, value) in values.iter().enumerate().take(area.width as usize) {
                let Some(value) = value else { continue };
                let x = area.x + i as u16;
                let y = map_price_to_row(*value).clamp(row_min, row_max);
                if let Some(cell) = buf.cell_mut((x, y as u16)) {
                    cell.set_symbol("•").set_fg(color);
                }
            }
        }
    }
}

/// Dashboards drawn outside a live terminal, e.g. for snapshots in tests.
#[cfg(test)]
pub(crate) fn render_to_lines(dashboard: &Dashboard, width: u16, height: u16) -> Vec<String> {
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
    terminal
        .draw(|f| {
            let area = f.area();
            let v = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Length(4), Constraint::Min(6), Constraint::Length(8)])
                .split(area);
            draw_tiles(f, v[0], &dashboard.metrics.tiles());
            draw_chart(f, v[1], &dashboard.chart, Interval::Min1);
            draw_table(f, v[2], &dashboard.table);
        })
        .unwrap();
    buffer_lines(terminal.backend().buffer())
}

#[cfg(test)]
pub(crate) fn buffer_lines(buf: &Buffer) -> Vec<String> {
    (0..buf.area.height)
        .map(|y| {
            (0..buf.area.width)
                .filter_map(|x| buf.cell((x, y)).map(|c| c.symbol().to_owned()))
                .collect()
        })
        .collect()
}
