use egui::epaint::Shadow;

pub struct DebugStats {
    pub fps: u32,
    pub frame_time_avg_ms: f32,
    pub frame_time_min_ms: f32,
    pub frame_time_max_ms: f32,
    pub entity_count: usize,
    pub draw_calls: u32,
    pub resolution: (u32, u32),
    pub camera_target: (f32, f32),
    pub camera_zoom: f32,
    /// Time spent on the last path request (ms). 0 if not yet run.
    pub pathfinding_ms: f32,
    /// Total number of path requests since startup.
    pub path_requests: u32,
}

/// One body's hitbox draw data, already projected to egui screen points.
pub struct BodyDebugDraw {
    /// Body centre in egui screen points.
    pub pos: egui::Pos2,
    /// Tip of the velocity arrow (0.25 s ahead) in egui screen points.
    pub vel_tip: egui::Pos2,
    /// Half the side of the body footprint in screen points.
    pub half_extent_px: f32,
    /// Whether obstacle collision is on. Drawn orange when off.
    pub colliding: bool,
    /// Waypoint the body is steering toward, if it follows a path.
    pub target: Option<egui::Pos2>,
}

/// One walkable cell of the navigation grid, already projected to egui
/// screen points. Toggled with M.
pub struct MeshCellDraw {
    /// Cell centre in egui screen points.
    pub center: egui::Pos2,
    /// Projected side length of the cell in screen points.
    pub size_px: f32,
}

pub struct DebugOverlay {
    pub visible: bool,
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
}

impl DebugOverlay {
    pub fn new(
        window: &winit::window::Window,
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
    ) -> Self {
        let egui_ctx = egui::Context::default();

        // Style: dark, semi-transparent, small monospace white font
        let mut visuals = egui::Visuals::dark();
        visuals.window_fill = egui::Color32::from_rgba_premultiplied(0, 0, 0, 180);
        visuals.window_stroke = egui::Stroke::NONE;
        visuals.window_shadow = Shadow::NONE;
        visuals.override_text_color = Some(egui::Color32::WHITE);
        egui_ctx.set_visuals(visuals);

        let mut style = (*egui_ctx.style()).clone();
        style.override_font_id = Some(egui::FontId::monospace(13.0));
        egui_ctx.set_style(style);

        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );

        let egui_renderer = egui_wgpu::Renderer::new(
            device,
            surface_format,
            None,  // no depth
            1,     // msaa samples
            false, // no dithering
        );

        Self {
            visible: false,
            egui_ctx,
            egui_state,
            egui_renderer,
        }
    }

    pub fn toggle(&mut self) {
        self.visible = !self.visible;
    }

    pub fn handle_window_event(
        &mut self,
        window: &winit::window::Window,
        event: &winit::event::WindowEvent,
    ) -> egui_winit::EventResponse {
        self.egui_state.on_window_event(window, event)
    }

    /// Render one egui frame covering the status panel and all optional
    /// debug layers:
    ///
    /// - `mesh_cells` : M walkable-cell overlay (`None` = hidden).
    /// - `path`       : the last queried route as a polyline from where the
    ///                  player stood through every waypoint (`None` = no route).
    /// - `body_draws` : D hitboxes + velocity arrows (`None` = hidden).
    /// - `stats`      : F3 stats panel (`None` = hidden).
    ///
    /// All layers are tessellated in a single egui pass.
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        window: &winit::window::Window,
        view: &wgpu::TextureView,
        screen_descriptor: &egui_wgpu::ScreenDescriptor,
        status: &[String],
        stats: Option<&DebugStats>,
        body_draws: Option<&[BodyDebugDraw]>,
        path: Option<&[egui::Pos2]>,
        mesh_cells: Option<&[MeshCellDraw]>,
    ) {
        let raw_input = self.egui_state.take_egui_input(window);

        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            // ── M: walkable cells (drawn first, behind everything else) ─────
            if let Some(cells) = mesh_cells {
                let painter = ctx.layer_painter(egui::LayerId::new(
                    egui::Order::Background,
                    egui::Id::new("nav_mesh"),
                ));
                let edge = egui::Stroke::new(
                    1.0,
                    egui::Color32::from_rgba_unmultiplied(0, 220, 255, 90),
                );
                for cell in cells {
                    let rect = egui::Rect::from_center_size(
                        cell.center,
                        egui::vec2(cell.size_px, cell.size_px),
                    );
                    painter.rect_filled(
                        rect,
                        0.0,
                        egui::Color32::from_rgba_unmultiplied(0, 220, 255, 40),
                    );
                    painter.rect_stroke(rect, 0.0, edge);
                    // Centroid dot.
                    painter.circle_filled(
                        cell.center,
                        1.5,
                        egui::Color32::from_rgba_unmultiplied(0, 220, 255, 160),
                    );
                }
            }

            // ── Last queried route ──────────────────────────────────────────────
            if let Some(points) = path {
                if points.len() >= 2 {
                    let painter = ctx.layer_painter(egui::LayerId::new(
                        egui::Order::Background,
                        egui::Id::new("nav_path"),
                    ));
                    let path_color = egui::Color32::from_rgb(0xff, 0xd9, 0x00);
                    painter.add(egui::Shape::line(
                        points.to_vec(),
                        egui::Stroke::new(3.0, path_color),
                    ));
                    for point in &points[1..] {
                        painter.circle_filled(*point, 4.0, path_color);
                    }
                }
            }

            // ── D: hitboxes drawn on a background layer ──────────────────────
            if let Some(draws) = body_draws {
                let painter = ctx.layer_painter(egui::LayerId::new(
                    egui::Order::Background,
                    egui::Id::new("body_debug"),
                ));
                let vel_stroke = egui::Stroke::new(
                    2.0,
                    egui::Color32::from_rgba_unmultiplied(80, 255, 140, 220),
                );
                let target_stroke = egui::Stroke::new(
                    1.0,
                    egui::Color32::from_rgba_unmultiplied(255, 217, 0, 160),
                );
                for draw in draws {
                    let box_color = if draw.colliding {
                        egui::Color32::from_rgba_unmultiplied(255, 0, 255, 200)
                    } else {
                        egui::Color32::from_rgba_unmultiplied(243, 134, 48, 200)
                    };
                    painter.rect_stroke(
                        egui::Rect::from_center_size(
                            draw.pos,
                            egui::vec2(draw.half_extent_px * 2.0, draw.half_extent_px * 2.0),
                        ),
                        0.0,
                        egui::Stroke::new(1.0, box_color),
                    );
                    if let Some(target) = draw.target {
                        painter.line_segment([draw.pos, target], target_stroke);
                    }
                    // Velocity direction arrow
                    painter.line_segment([draw.pos, draw.vel_tip], vel_stroke);
                    painter.circle_filled(
                        draw.vel_tip,
                        2.5,
                        egui::Color32::from_rgba_unmultiplied(80, 255, 140, 220),
                    );
                }
            }

            // ── Status lines (always shown) ──────────────────────────────────
            egui::Area::new(egui::Id::new("status_panel"))
                .fixed_pos(egui::pos2(10.0, 100.0))
                .show(ctx, |ui| {
                    egui::Frame::none()
                        .fill(egui::Color32::from_rgba_premultiplied(230, 230, 230, 230))
                        .inner_margin(egui::Margin::symmetric(20.0, 10.0))
                        .show(ui, |ui: &mut egui::Ui| {
                            for line in status {
                                ui.label(
                                    egui::RichText::new(line)
                                        .color(egui::Color32::from_rgb(0xff, 0x00, 0x44))
                                        .size(18.0),
                                );
                            }
                        });
                });

            // ── F3: stats panel ──────────────────────────────────────────────
            if let Some(stats) = stats {
                egui::Area::new(egui::Id::new("debug_overlay"))
                    .fixed_pos(egui::pos2(10.0, 10.0))
                    .show(ctx, |ui| {
                        egui::Frame::none()
                            .fill(egui::Color32::from_rgba_premultiplied(0, 0, 0, 180))
                            .inner_margin(egui::Margin::same(8.0))
                            .rounding(4.0)
                            .show(ui, |ui: &mut egui::Ui| {
                                ui.label(format!("FPS: {}", stats.fps));
                                ui.label(format!(
                                    "Frame: {:.2} ms (min: {:.1} | max: {:.1})",
                                    stats.frame_time_avg_ms,
                                    stats.frame_time_min_ms,
                                    stats.frame_time_max_ms
                                ));
                                ui.label(format!("Entities: {}", stats.entity_count));
                                ui.label(format!("Draw calls: {}", stats.draw_calls));
                                ui.label(format!(
                                    "Resolution: {} x {}",
                                    stats.resolution.0, stats.resolution.1
                                ));
                                ui.label(format!(
                                    "Camera: ({:.1}, {:.1})  zoom {:.0}%",
                                    stats.camera_target.0, stats.camera_target.1,
                                    stats.camera_zoom * 100.0
                                ));
                                ui.label(format!(
                                    "Pathfinding: {:.3} ms  Requests: {}",
                                    stats.pathfinding_ms,
                                    stats.path_requests,
                                ));
                            });
                    });
            }
        });

        self.egui_state
            .handle_platform_output(window, full_output.platform_output);

        let tris = self
            .egui_ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);

        for (id, image_delta) in &full_output.textures_delta.set {
            self.egui_renderer
                .update_texture(device, queue, *id, image_delta);
        }

        self.egui_renderer
            .update_buffers(device, queue, encoder, &tris, screen_descriptor);

        {
            let render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("egui Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            self.egui_renderer
                .render(&mut render_pass.forget_lifetime(), &tris, screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }
    }
}
