// src/gui.rs
use std::time::{Duration, Instant};

use dual_adc_analyzer::drivers::cache::cache_path_for;
use dual_adc_analyzer::drivers::plot::{render_snapshot_png, PlotStyle};
use dual_adc_analyzer::drivers::SampleTable;
use dual_adc_analyzer::{AnalyzerSession, RenderSnapshot, SessionState, Tick};
use eframe::egui;
use egui::Color32;
use egui_plot::{Legend, Line, MarkerShape, Plot, PlotPoints, Points};

pub struct AnalyzerApp {
    session: AnalyzerSession,
    file_path: String,
    export_path: String,
    threshold: f64,
    snapshot: RenderSnapshot,
    last_tick: Instant,
    log_messages: Vec<String>,
}

impl AnalyzerApp {
    pub fn new(session: AnalyzerSession, file_path: String) -> Self {
        let threshold = session.config().threshold;
        let mut app = Self {
            session,
            file_path,
            export_path: "snapshot.png".to_owned(),
            threshold,
            snapshot: RenderSnapshot::default(),
            last_tick: Instant::now(),
            log_messages: vec!["Dual ADC Signal Analyzer ready.".to_owned()],
        };
        if !app.file_path.is_empty() {
            app.load_file();
        }
        app
    }

    fn log(&mut self, msg: &str) {
        self.log_messages.push(format!("> {}", msg));
        if self.log_messages.len() > 8 {
            self.log_messages.remove(0);
        }
    }

    fn load_file(&mut self) {
        let path = self.file_path.trim().to_owned();
        if path.ends_with(".json") {
            match self.session.load_cached(&path) {
                Ok(()) => self.log(&format!("Loaded cache: {}", path)),
                Err(e) => self.log(&e.to_string()),
            }
            return;
        }
        if let Err(e) = self.session.load_csv_path(&path) {
            self.log(&e.to_string());
            return;
        }
        self.log(&format!("Loaded: {}", path));
        // 写缓存失败不影响分析
        let cache = cache_path_for(&path);
        match self.session.save_cache(&cache) {
            Ok(()) => self.log(&format!("Cached to {}", cache.display())),
            Err(e) => log::warn!("could not write cache {}: {e}", cache.display()),
        }
    }

    fn load_demo(&mut self) {
        let rows = (self.session.config().sample_rate * 60.0) as usize;
        let table = SampleTable::synthetic(rows, &mut rand::thread_rng());
        match self.session.load_table(table) {
            Ok(()) => self.log("Loaded: simulated capture (60s)"),
            Err(e) => self.log(&e.to_string()),
        }
    }

    fn start(&mut self) {
        self.session.set_threshold(self.threshold);
        match self.session.start() {
            Ok(()) => {
                self.snapshot = RenderSnapshot::default();
                self.log("Analysis started");
            }
            Err(e) => self.log(&e.to_string()),
        }
    }

    fn export_png(&mut self) {
        let path = self.export_path.trim().to_owned();
        let result = render_snapshot_png(&self.snapshot, &PlotStyle::default())
            .and_then(|png| std::fs::write(&path, png).map_err(Into::into));
        match result {
            Ok(()) => self.log(&format!("Saved {}", path)),
            Err(e) => self.log(&e.to_string()),
        }
    }

    fn tick(&mut self) {
        let interval = Duration::from_millis(self.session.config().tick_interval_ms);
        if self.last_tick.elapsed() < interval {
            return;
        }
        self.last_tick = Instant::now();
        let was_running = self.session.state() == SessionState::Running;
        if let Tick::Snapshot(snapshot) = self.session.drain_and_render() {
            for summary in [&snapshot.adc1_summary, &snapshot.adc2_summary]
                .into_iter()
                .flatten()
            {
                log::debug!("{summary}");
            }
            self.snapshot = snapshot;
        }
        if was_running && self.session.state() == SessionState::Completed {
            self.log("Analysis completed");
        }
    }
}

impl eframe::App for AnalyzerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.tick();
        if self.session.is_ingesting() {
            ctx.request_repaint_after(Duration::from_millis(50));
        }

        egui::SidePanel::left("controls").min_width(280.0).show(ctx, |ui| {
            ui.add_space(10.0);
            ui.heading("Dual ADC Signal Analyzer");
            ui.separator();

            ui.label("Data file (CSV or cache .json)");
            ui.text_edit_singleline(&mut self.file_path);
            ui.horizontal(|ui| {
                if ui.button("Load Data File").clicked() {
                    self.load_file();
                }
                if ui.button("Simulated").clicked() {
                    self.load_demo();
                }
            });

            ui.add_space(10.0);
            ui.label("Peak Sensitivity (Threshold):");
            ui.add(egui::Slider::new(&mut self.threshold, 0.0..=1000.0).step_by(10.0));

            ui.horizontal(|ui| {
                let running = self.session.state() == SessionState::Running;
                if ui
                    .add_enabled(!running && self.session.table().is_some(), egui::Button::new("Start Analysis"))
                    .clicked()
                {
                    self.start();
                }
                if ui.add_enabled(running, egui::Button::new("Stop Analysis")).clicked() {
                    self.session.stop();
                    self.log("Analysis stopped");
                }
            });

            ui.add_space(10.0);
            ui.add(egui::ProgressBar::new(self.session.progress() as f32).show_percentage());
            ui.label(self.session.stats_line());
            ui.label(format!("Ingested: {:.1}s", self.session.ingested_duration()));
            ui.label(format!("State: {:?}", self.session.state()));

            ui.add_space(10.0);
            ui.separator();
            ui.label("Export current view");
            ui.text_edit_singleline(&mut self.export_path);
            if ui
                .add_enabled(!self.snapshot.is_empty(), egui::Button::new("Export PNG"))
                .clicked()
            {
                self.export_png();
            }

            ui.add_space(10.0);
            egui::ScrollArea::vertical().max_height(140.0).show(ui, |ui| {
                for m in &self.log_messages {
                    ui.monospace(m);
                }
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            let [y_min, y_max] = self.session.config().y_range;
            let (t0, t1) = self.snapshot.window;
            let s = &self.snapshot;
            Plot::new("live_plot")
                .legend(Legend::default())
                .include_y(y_min)
                .include_y(y_max)
                .include_x(t0)
                .include_x(t1.max(t0 + self.session.config().display_time))
                .show(ui, |plot_ui| {
                    let channels = [
                        ("ADC1", &s.adc1_samples, &s.adc1_peak_positions, Color32::from_rgb(60, 120, 255)),
                        ("ADC2", &s.adc2_samples, &s.adc2_peak_positions, Color32::from_rgb(60, 200, 90)),
                    ];
                    for (name, samples, peaks, color) in channels {
                        let line = RenderSnapshot::line_points(samples, &s.time_axis);
                        if line.is_empty() {
                            continue;
                        }
                        plot_ui.line(
                            Line::new(PlotPoints::new(line))
                                .name(format!("{name} Signal"))
                                .color(color),
                        );
                        let markers = RenderSnapshot::peak_points(samples, &s.time_axis, peaks);
                        plot_ui.points(
                            Points::new(PlotPoints::new(markers))
                                .name(format!("{name} Peaks"))
                                .shape(MarkerShape::Cross)
                                .radius(6.0)
                                .color(Color32::RED),
                        );
                    }
                });
        });
    }
}
