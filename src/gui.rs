use crate::app::App;
use crate::config::ForecastHorizon;
use crate::pipeline::ChartSpec;
use crate::viewport::{CanvasSize, PixelPos, ViewportController};
use chrono::TimeZone;
use eframe::egui;
use egui_plot::{Line, MarkerShape, Plot, PlotBounds, PlotPoints, PlotResponse, PlotUi, Points, Polygon};
use tracing::debug;

// ──────────────────────────────────────────────────────────────────────────────
// Color Palette
// ──────────────────────────────────────────────────────────────────────────────

const ACCENT_BLUE: egui::Color32 = egui::Color32::from_rgb(59, 130, 246);
const ACCENT_GREEN: egui::Color32 = egui::Color32::from_rgb(34, 197, 94);
const ACCENT_RED: egui::Color32 = egui::Color32::from_rgb(239, 68, 68);
const ACCENT_CYAN: egui::Color32 = egui::Color32::from_rgb(34, 211, 238);

const BG_DARK: egui::Color32 = egui::Color32::from_rgb(15, 15, 20);
const BG_CARD: egui::Color32 = egui::Color32::from_rgb(24, 24, 32);
const BG_ELEVATED: egui::Color32 = egui::Color32::from_rgb(32, 32, 44);
const TEXT_PRIMARY: egui::Color32 = egui::Color32::from_rgb(226, 232, 240);
const TEXT_SECONDARY: egui::Color32 = egui::Color32::from_rgb(148, 163, 184);
const BORDER_SUBTLE: egui::Color32 = egui::Color32::from_rgb(51, 51, 68);

const TABLE_HEIGHT: f32 = 200.0;

pub struct GuiApp {
    app: App,
}

impl GuiApp {
    pub fn new(app: App) -> Self {
        Self { app }
    }

    fn apply_theme(ctx: &egui::Context) {
        let mut style = (*ctx.style()).clone();

        style.visuals.window_rounding = egui::Rounding::same(8.0);
        style.visuals.widgets.noninteractive.rounding = egui::Rounding::same(6.0);
        style.visuals.widgets.inactive.rounding = egui::Rounding::same(6.0);
        style.visuals.widgets.active.rounding = egui::Rounding::same(6.0);
        style.visuals.widgets.hovered.rounding = egui::Rounding::same(6.0);

        style.visuals.dark_mode = true;
        style.visuals.panel_fill = BG_DARK;
        style.visuals.window_fill = BG_CARD;
        style.visuals.faint_bg_color = BG_ELEVATED;

        style.visuals.widgets.noninteractive.bg_fill = BG_CARD;
        style.visuals.widgets.noninteractive.fg_stroke = egui::Stroke::new(1.0, TEXT_SECONDARY);
        style.visuals.widgets.inactive.bg_fill = BG_ELEVATED;
        style.visuals.widgets.inactive.fg_stroke = egui::Stroke::new(1.0, TEXT_PRIMARY);
        style.visuals.widgets.hovered.bg_fill = egui::Color32::from_rgb(45, 45, 60);
        style.visuals.widgets.hovered.fg_stroke = egui::Stroke::new(1.0, egui::Color32::WHITE);
        style.visuals.widgets.active.bg_fill = ACCENT_BLUE;
        style.visuals.widgets.active.fg_stroke = egui::Stroke::new(1.0, egui::Color32::WHITE);

        style.visuals.selection.bg_fill = ACCENT_BLUE.linear_multiply(0.4);
        style.visuals.selection.stroke = egui::Stroke::new(1.0, ACCENT_BLUE);

        style.spacing.item_spacing = egui::vec2(8.0, 6.0);

        ctx.set_style(style);
    }
}

impl eframe::App for GuiApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        Self::apply_theme(ctx);
        self.app.tick();

        if self.app.busy {
            ctx.set_cursor_icon(egui::CursorIcon::Wait);
            ctx.request_repaint();
        }

        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.add_space(4.0);
            ui.horizontal(|ui| {
                ui.add_space(8.0);
                ui.label(egui::RichText::new("Stock Price Predictor")
                    .size(18.0)
                    .strong()
                    .color(ACCENT_BLUE));
                ui.add_space(4.0);
                ui.label(egui::RichText::new("Trend Forecast & Anomaly Scan")
                    .size(11.0)
                    .color(TEXT_SECONDARY));

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.add_space(8.0);
                    ui.label(egui::RichText::new(format!("Data through {}", self.app.config.as_of))
                        .size(11.0)
                        .color(TEXT_SECONDARY));
                });
            });
            ui.add_space(4.0);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.render_input_card(ui);
            ui.add_space(8.0);
            self.render_tables(ui);
            ui.add_space(8.0);
            self.render_chart(ui);
        });
    }
}

// ──────────────────────────────────────────────────────────────────────────────
// Input Parameters
// ──────────────────────────────────────────────────────────────────────────────

impl GuiApp {
    fn render_input_card(&mut self, ui: &mut egui::Ui) {
        card_frame(16.0).show(ui, |ui| {
            section_header(ui, "Input Parameters");

            let busy = self.app.busy;
            let mut submit = false;

            ui.add_enabled_ui(!busy, |ui| {
                egui::Grid::new("input_grid")
                    .num_columns(2)
                    .spacing([12.0, 8.0])
                    .show(ui, |ui| {
                        field_label(ui, "Stock Ticker (e.g., NVDA):");
                        let ticker = ui.add(
                            egui::TextEdit::singleline(&mut self.app.ticker_input)
                                .desired_width(240.0)
                                .hint_text("e.g. NVDA, AAPL, SPY..."),
                        );
                        if ticker.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                            submit = true;
                        }
                        ui.end_row();

                        field_label(ui, "Start Date:");
                        ui.add(
                            egui::TextEdit::singleline(&mut self.app.start_input)
                                .desired_width(240.0)
                                .hint_text("YYYY-MM-DD"),
                        );
                        ui.end_row();

                        field_label(ui, "End Date:");
                        ui.add(
                            egui::TextEdit::singleline(&mut self.app.end_input)
                                .desired_width(240.0)
                                .hint_text("YYYY-MM-DD"),
                        );
                        ui.end_row();

                        field_label(ui, "Forecast Period (days):");
                        egui::ComboBox::new("forecast_horizon", "")
                            .selected_text(self.app.horizon.to_string())
                            .width(240.0)
                            .show_ui(ui, |ui| {
                                for horizon in ForecastHorizon::ALL {
                                    ui.selectable_value(&mut self.app.horizon, horizon, horizon.to_string());
                                }
                            });
                        ui.end_row();
                    });

                ui.add_space(8.0);
                ui.horizontal(|ui| {
                    let btn = ui.add_sized(
                        [240.0, 36.0],
                        egui::Button::new(
                            egui::RichText::new("Predict Stock Price")
                                .size(14.0)
                                .strong()
                                .color(egui::Color32::WHITE),
                        )
                        .fill(ACCENT_BLUE)
                        .rounding(egui::Rounding::same(8.0)),
                    );
                    if btn.clicked() {
                        submit = true;
                    }
                });
            });

            if busy {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label(egui::RichText::new("Fetching data and fitting model...")
                        .size(12.0)
                        .color(TEXT_SECONDARY));
                });
            }

            if submit {
                self.app.trigger_predict();
            }

            let mut dismiss = false;
            if let Some(err) = &self.app.error_msg {
                ui.add_space(8.0);
                egui::Frame::none()
                    .fill(egui::Color32::from_rgba_premultiplied(239, 68, 68, 25))
                    .rounding(egui::Rounding::same(6.0))
                    .inner_margin(egui::Margin::same(8.0))
                    .show(ui, |ui| {
                        ui.horizontal(|ui| {
                            ui.label(egui::RichText::new(format!("Error: {}", err))
                                .color(ACCENT_RED)
                                .size(12.0));
                            if ui.small_button("Dismiss").clicked() {
                                dismiss = true;
                            }
                        });
                    });
            }
            if dismiss {
                self.app.error_msg = None;
            }
        });
    }
}

// ──────────────────────────────────────────────────────────────────────────────
// Result Tables
// ──────────────────────────────────────────────────────────────────────────────

impl GuiApp {
    fn render_tables(&self, ui: &mut egui::Ui) {
        let half = (ui.available_width() - 12.0) / 2.0;
        ui.horizontal(|ui| {
            ui.vertical(|ui| {
                ui.set_width(half);
                self.render_forecast_table(ui);
            });
            ui.vertical(|ui| {
                ui.set_width(half);
                self.render_anomaly_table(ui);
            });
        });
    }

    fn render_forecast_table(&self, ui: &mut egui::Ui) {
        card_frame(12.0).show(ui, |ui| {
            section_header(ui, "Forecast Results");
            ui.push_id("forecast_rows", |ui| {
                egui::ScrollArea::vertical()
                    .max_height(TABLE_HEIGHT)
                    .auto_shrink([false, true])
                    .show(ui, |ui| {
                        egui::Grid::new("forecast_grid")
                            .striped(true)
                            .num_columns(4)
                            .min_col_width(100.0)
                            .show(ui, |ui| {
                                for heading in ["Date", "Predicted Price", "Lower Bound", "Upper Bound"] {
                                    column_heading(ui, heading);
                                }
                                ui.end_row();

                                let rows = self.app.report.iter().flat_map(|r| &r.forecast_rows);
                                for row in rows {
                                    cell(ui, row.date.format("%Y-%m-%d").to_string(), TEXT_PRIMARY);
                                    cell(ui, format!("${:.2}", row.predicted), ACCENT_CYAN);
                                    cell(ui, format!("${:.2}", row.lower_bound), TEXT_SECONDARY);
                                    cell(ui, format!("${:.2}", row.upper_bound), TEXT_SECONDARY);
                                    ui.end_row();
                                }
                            });
                    });
            });
        });
    }

    fn render_anomaly_table(&self, ui: &mut egui::Ui) {
        card_frame(12.0).show(ui, |ui| {
            section_header(ui, "Detected Anomalies");
            ui.push_id("anomaly_rows", |ui| {
                egui::ScrollArea::vertical()
                    .max_height(TABLE_HEIGHT)
                    .auto_shrink([false, true])
                    .show(ui, |ui| {
                        egui::Grid::new("anomaly_grid")
                            .striped(true)
                            .num_columns(3)
                            .min_col_width(100.0)
                            .show(ui, |ui| {
                                for heading in ["Date", "Price", "Z-Score"] {
                                    column_heading(ui, heading);
                                }
                                ui.end_row();

                                let rows = self.app.report.iter().flat_map(|r| &r.anomalies);
                                for row in rows {
                                    let color = if row.z_score > 0.0 { ACCENT_GREEN } else { ACCENT_RED };
                                    cell(ui, row.date.format("%Y-%m-%d").to_string(), TEXT_PRIMARY);
                                    cell(ui, format!("${:.2}", row.close_price), TEXT_PRIMARY);
                                    cell(ui, format!("{:.2}", row.z_score), color);
                                    ui.end_row();
                                }
                            });
                    });
            });
        });
    }
}

// ──────────────────────────────────────────────────────────────────────────────
// Chart
// ──────────────────────────────────────────────────────────────────────────────

impl GuiApp {
    fn render_chart(&mut self, ui: &mut egui::Ui) {
        let app = &mut self.app;
        card_frame(8.0).show(ui, |ui| {
            let (Some(report), Some(controller)) = (&app.report, app.viewport.as_mut()) else {
                ui.centered_and_justified(|ui| {
                    ui.label(egui::RichText::new("Enter a ticker and press Predict to draw the forecast.")
                        .size(13.0)
                        .color(TEXT_SECONDARY));
                });
                return;
            };

            ui.vertical_centered(|ui| {
                ui.label(egui::RichText::new(&report.chart.title)
                    .size(15.0)
                    .strong()
                    .color(TEXT_PRIMARY));
            });

            let bounds = controller.viewport();
            let plot = Plot::new("forecast_chart")
                .legend(egui_plot::Legend::default().position(egui_plot::Corner::LeftTop))
                .x_axis_label("Date")
                .y_axis_label("Price")
                .x_axis_formatter(|mark, _range| format_date(mark.value, "%Y-%m-%d"))
                .label_formatter(|name, value| {
                    let date = format_date(value.x, "%Y-%m-%d");
                    if name.is_empty() {
                        format!("Date: {}\nPrice: ${:.2}", date, value.y)
                    } else {
                        format!("{}\nDate: {}\nPrice: ${:.2}", name, date, value.y)
                    }
                })
                .show_grid(true)
                .height(ui.available_height().max(240.0))
                .allow_drag(false)
                .allow_zoom(false)
                .allow_scroll(false)
                .allow_boxed_zoom(false)
                .allow_double_click_reset(false);

            let response = plot.show(ui, |plot_ui| {
                plot_ui.set_plot_bounds(PlotBounds::from_min_max(
                    [bounds.x_min(), bounds.y_min()],
                    [bounds.x_max(), bounds.y_max()],
                ));
                draw_chart_layers(plot_ui, &report.chart);
            });

            if handle_chart_input(ui, &response, controller) {
                ui.ctx().request_repaint();
            }
        });
    }
}

fn draw_chart_layers(plot_ui: &mut PlotUi, chart: &ChartSpec) {
    let band_fill = egui::Color32::from_rgba_unmultiplied(239, 68, 68, 26);
    for pair in chart.band.windows(2) {
        let (x0, lo0, hi0) = pair[0];
        let (x1, lo1, hi1) = pair[1];
        let quad = PlotPoints::new(vec![[x0, lo0], [x1, lo1], [x1, hi1], [x0, hi0]]);
        plot_ui.polygon(
            Polygon::new(quad)
                .name("Confidence Interval")
                .fill_color(band_fill)
                .stroke(egui::Stroke::new(0.0, band_fill)),
        );
    }

    let historical: PlotPoints = chart.historical.iter().copied().collect();
    plot_ui.line(Line::new(historical)
        .name("Historical Data")
        .color(ACCENT_BLUE)
        .width(1.6));

    let forecast: PlotPoints = chart.forecast.iter().copied().collect();
    plot_ui.line(Line::new(forecast)
        .name("Forecast")
        .color(ACCENT_RED)
        .width(1.6));

    if !chart.anomalies.is_empty() {
        let anomalies: PlotPoints = chart.anomalies.iter().copied().collect();
        plot_ui.points(Points::new(anomalies)
            .name("Anomalies")
            .shape(MarkerShape::Circle)
            .filled(true)
            .radius(4.0)
            .color(ACCENT_GREEN));
    }
}

/// Routes pointer events on the plot frame to the viewport controller.
/// Returns whether the viewport changed.
fn handle_chart_input(
    ui: &egui::Ui,
    response: &PlotResponse<()>,
    controller: &mut ViewportController,
) -> bool {
    let frame = *response.transform.frame();
    let Ok(canvas) = CanvasSize::new(frame.width() as f64, frame.height() as f64) else {
        return false;
    };
    let to_pixel = |pos: egui::Pos2| {
        PixelPos::new((pos.x - frame.min.x) as f64, (pos.y - frame.min.y) as f64)
    };
    let resp = &response.response;
    let mut changed = false;

    if resp.double_clicked() {
        controller.reset();
        changed = true;
    }

    if resp.drag_started_by(egui::PointerButton::Primary) {
        if let Some(pos) = resp.interact_pointer_pos() {
            controller.start_pan(to_pixel(pos));
        }
    } else if resp.dragged_by(egui::PointerButton::Primary) {
        if let Some(pos) = resp.interact_pointer_pos() {
            match controller.pan(canvas, to_pixel(pos)) {
                Ok(moved) => changed |= moved,
                Err(e) => debug!("Ignoring pan event: {}", e),
            }
        }
    }
    if resp.drag_stopped() {
        controller.end_pan();
    }

    if resp.hovered() {
        let scroll = ui.input(|i| i.raw_scroll_delta.y);
        if scroll != 0.0 {
            if let Some(pos) = resp.hover_pos() {
                match controller.zoom(canvas, to_pixel(pos), scroll as f64) {
                    Ok(zoomed) => changed |= zoomed,
                    Err(e) => debug!("Ignoring zoom event: {}", e),
                }
            }
        }
    }

    changed
}

// ──────────────────────────────────────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────────────────────────────────────

fn format_date(unix_seconds: f64, pattern: &str) -> String {
    chrono::Utc.timestamp_opt(unix_seconds as i64, 0)
        .single()
        .map(|dt| dt.format(pattern).to_string())
        .unwrap_or_default()
}

fn card_frame(margin: f32) -> egui::Frame {
    egui::Frame::none()
        .fill(BG_CARD)
        .rounding(egui::Rounding::same(8.0))
        .stroke(egui::Stroke::new(1.0, BORDER_SUBTLE))
        .inner_margin(egui::Margin::same(margin))
}

fn section_header(ui: &mut egui::Ui, text: &str) {
    ui.label(egui::RichText::new(text)
        .size(13.0)
        .strong()
        .color(TEXT_PRIMARY));
    ui.add_space(4.0);
}

fn field_label(ui: &mut egui::Ui, text: &str) {
    ui.label(egui::RichText::new(text).size(12.0).color(TEXT_SECONDARY));
}

fn column_heading(ui: &mut egui::Ui, text: &str) {
    ui.label(egui::RichText::new(text).size(12.0).strong().color(TEXT_PRIMARY));
}

fn cell(ui: &mut egui::Ui, text: String, color: egui::Color32) {
    ui.label(egui::RichText::new(text).size(11.0).color(color));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_labels_are_utc_calendar_dates() {
        let midnight = crate::data::date_to_unix(chrono::NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(format_date(midnight as f64, "%Y-%m-%d"), "2024-02-29");
        assert_eq!(format_date(midnight as f64 + 86_399.0, "%Y-%m-%d"), "2024-02-29");
    }
}
