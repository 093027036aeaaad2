// Click-to-move demo on a tile map, rendered top-down with INSTANCED squares.
// Click anywhere to walk there along a path; arrow keys walk freely.
//   M : toggle walkable-cell overlay
//   D : toggle hitboxes
//   F3: toggle stats

mod engine;

use std::sync::Arc;
use std::time::Instant;

use bevy_ecs::prelude::*;
use glam::Vec2;
use log::{debug, error, info, warn};
use wgpu::util::DeviceExt;
use winit::{
    event::{Event as WinitEvent, WindowEvent, ElementState, KeyEvent},
    event_loop::EventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::Window,
};

use engine::camera::FollowCamera;
use engine::debug_overlay::{BodyDebugDraw, DebugOverlay, DebugStats, MeshCellDraw};
use engine::input::InputState;
use engine::navigation::TILE_SIZE;
use engine::steering::{PathFollower, PathQuery};
use engine::systems::{follow_path_system, free_move_system, movement_system, request_player_path, spawn_player};
use engine::tilemap::{TileMap, TOWN};
use engine::{Body, Color as EntityColor, ObstacleCollider, Player, Transform, Velocity, WalkAnimation};

/// Longest frame step fed to the simulation, in seconds.
const MAX_FRAME_DT: f32 = 0.1;
/// Walk-cycle frames per second and frames per cycle.
const WALK_FRAME_RATE: f32 = 10.0;
const WALK_FRAMES: u32 = 4;

const WALL_COLOR: [f32; 4] = [0.16, 0.16, 0.2, 1.0];
const FLOOR_COLORS: [[f32; 4]; 2] = [[0.42, 0.58, 0.36, 1.0], [0.40, 0.55, 0.34, 1.0]];

// ============================================================================
// VERTEX DEFINITION
// ============================================================================

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Vertex {
    position: [f32; 3],
}

impl Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

// ============================================================================
// INSTANCE DATA (per-square)
// ============================================================================

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct InstanceData {
    position: [f32; 3],
    scale: f32,
    color: [f32; 4],
}

impl InstanceData {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<InstanceData>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                // Position + scale (location 1)
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x4,
                },
                // Color (location 2)
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 4]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x4,
                },
            ],
        }
    }

    fn square(center: Vec2, layer: f32, size: f32, color: [f32; 4]) -> Self {
        Self {
            position: [center.x, layer, center.y],
            scale: size,
            color,
        }
    }
}

// Unit square on the ground plane
const QUAD_VERTICES: &[Vertex] = &[
    Vertex { position: [-0.5, 0.0, -0.5] },
    Vertex { position: [ 0.5, 0.0, -0.5] },
    Vertex { position: [ 0.5, 0.0,  0.5] },
    Vertex { position: [-0.5, 0.0,  0.5] },
];

const QUAD_INDICES: &[u16] = &[0, 1, 2, 0, 2, 3];

// ============================================================================
// UNIFORM DATA (camera only)
// ============================================================================

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Uniforms {
    view_proj: [[f32; 4]; 4],
}

// ============================================================================
// FRAME TIMING
// ============================================================================

/// Per-second frame statistics for the F3 panel.
struct FrameTimer {
    window_start: Instant,
    frames: u32,
    sum_ms: f32,
    min_ms: f32,
    max_ms: f32,
    fps: u32,
    avg_ms: f32,
    last_min_ms: f32,
    last_max_ms: f32,
}

impl FrameTimer {
    fn new() -> Self {
        Self {
            window_start: Instant::now(),
            frames: 0,
            sum_ms: 0.0,
            min_ms: f32::MAX,
            max_ms: 0.0,
            fps: 0,
            avg_ms: 0.0,
            last_min_ms: 0.0,
            last_max_ms: 0.0,
        }
    }

    fn record(&mut self, dt: f32) {
        let ms = dt * 1000.0;
        self.frames += 1;
        self.sum_ms += ms;
        self.min_ms = self.min_ms.min(ms);
        self.max_ms = self.max_ms.max(ms);

        if self.window_start.elapsed().as_secs_f32() >= 1.0 {
            self.fps = self.frames;
            self.avg_ms = self.sum_ms / self.frames as f32;
            self.last_min_ms = self.min_ms;
            self.last_max_ms = self.max_ms;
            self.window_start = Instant::now();
            self.frames = 0;
            self.sum_ms = 0.0;
            self.min_ms = f32::MAX;
            self.max_ms = 0.0;
        }
    }
}

// ============================================================================
// APPLICATION STATE
// ============================================================================

struct State {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: winit::dpi::PhysicalSize<u32>,
    render_pipeline: wgpu::RenderPipeline,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    instance_buffer: wgpu::Buffer,
    num_indices: u32,
    max_instances: usize,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    overlay: DebugOverlay,

    // ECS World
    world: World,
    map: TileMap,
    tile_instances: Vec<InstanceData>,
    started: Instant,
    last_update: Instant,

    camera: FollowCamera,
    input: InputState,

    // Overlay state
    status: [String; 4],
    show_mesh: bool,
    show_hitboxes: bool,
    timer: FrameTimer,
    last_path_ms: f32,
    path_requests: u32,
}

impl State {
    async fn new(window: Arc<Window>, map: TileMap) -> Self {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .expect("failed to create surface");

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .expect("no compatible GPU adapter");

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: None,
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await
            .expect("failed to open GPU device");

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: surface_caps.present_modes[0],
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        surface.configure(&device, &config);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shader_instanced.wgsl").into()),
        });

        let uniforms = Uniforms {
            view_proj: glam::Mat4::IDENTITY.to_cols_array_2d(),
        };

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Uniform Buffer"),
            contents: bytemuck::cast_slice(&[uniforms]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let uniform_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
                label: Some("uniform_bind_group_layout"),
            });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &uniform_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
            label: Some("uniform_bind_group"),
        });

        let render_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Render Pipeline Layout"),
                bind_group_layouts: &[&uniform_bind_group_layout],
                push_constant_ranges: &[],
            });

        let render_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Render Pipeline"),
            layout: Some(&render_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[Vertex::desc(), InstanceData::desc()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                // Squares are seen from above; draw both windings.
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            // No depth buffer: instances are drawn in submission order.
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
            cache: None,
        });

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Vertex Buffer"),
            contents: bytemuck::cast_slice(QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Index Buffer"),
            contents: bytemuck::cast_slice(QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });

        let tile_instances = build_tile_instances(&map);
        // Tiles plus the player body and its facing marker.
        let max_instances = tile_instances.len() + 16;
        let instance_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Instance Buffer"),
            size: (max_instances * std::mem::size_of::<InstanceData>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let num_indices = QUAD_INDICES.len() as u32;

        let overlay = DebugOverlay::new(&window, &device, surface_format);

        let mut world = World::new();
        spawn_player(&mut world, map.spawn);
        info!(
            "map {}x{} tiles, player spawned at {:?}",
            map.grid.width, map.grid.height, map.spawn
        );

        let mut camera = FollowCamera::new(map.grid.world_size());
        let input = InputState::new();
        camera.update(&input, map.spawn);

        Self {
            window,
            surface,
            device,
            queue,
            config,
            size,
            render_pipeline,
            vertex_buffer,
            index_buffer,
            instance_buffer,
            num_indices,
            max_instances,
            uniform_buffer,
            uniform_bind_group,
            overlay,
            world,
            map,
            tile_instances,
            started: Instant::now(),
            last_update: Instant::now(),
            camera,
            input,
            status: [
                "Click to find a path!".to_string(),
                "Is mouse inside navmesh: no ".to_string(),
                "Press 'M' to see navmesh.".to_string(),
                "Arrow keys to move, 'D' for hitboxes".to_string(),
            ],
            show_mesh: false,
            show_hitboxes: false,
            timer: FrameTimer::new(),
            last_path_ms: 0.0,
            path_requests: 0,
        }
    }

    fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    fn screen(&self) -> Vec2 {
        Vec2::new(self.size.width as f32, self.size.height as f32)
    }

    fn player_position(&mut self) -> Option<Vec2> {
        let mut query = self.world.query_filtered::<&Transform, With<Player>>();
        query.get_single(&self.world).ok().map(Transform::ground)
    }

    fn update(&mut self) {
        let now = Instant::now();
        let dt = (now - self.last_update).as_secs_f32().min(MAX_FRAME_DT);
        self.last_update = now;
        self.timer.record(dt);

        let screen = self.screen();

        // Pointer-down: route the player to the clicked ground point.
        for click in std::mem::take(&mut self.input.clicks) {
            let end = self.camera.screen_to_ground(Vec2::from(click), screen);
            debug!("go {:?} -> {:?}", self.player_position(), end);

            let started = Instant::now();
            let found = request_player_path(&mut self.world, &self.map.grid, end).unwrap_or(false);
            let ms = started.elapsed().as_secs_f32() * 1000.0;

            self.last_path_ms = ms;
            self.path_requests += 1;
            self.status[0] = if found {
                format!("Path found in: {ms:.3}ms")
            } else {
                format!("No path found ({ms:.3}ms)")
            };
        }

        // Pointer-move: report whether the cursor is over walkable ground.
        if self.input.mouse_moved {
            let hovered = self
                .camera
                .screen_to_ground(Vec2::from(self.input.mouse_position), screen);
            let inside = self.map.grid.is_point_in_mesh(hovered);
            self.status[1] = format!("Is mouse inside navmesh: {}", if inside { "yes" } else { "no " });
        }

        if self.input.was_key_pressed(KeyCode::KeyM) {
            self.show_mesh = !self.show_mesh;
        }
        if self.input.was_key_pressed(KeyCode::KeyD) {
            self.show_hitboxes = !self.show_hitboxes;
        }
        if self.input.was_key_pressed(KeyCode::F3) {
            self.overlay.toggle();
        }

        // Arrow keys take over from the path follower while held.
        if !free_move_system(&mut self.world, self.input.arrow_direction()) {
            follow_path_system(&mut self.world, dt);
        }
        movement_system(&mut self.world, &self.map.grid, dt);

        if let Some(focus) = self.player_position() {
            self.camera.update(&self.input, focus);
        }
    }

    fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        // Collect instance data from ECS BEFORE creating render pass
        let mut instance_data = self.tile_instances.clone();
        let walk_frame = (self.started.elapsed().as_secs_f32() * WALK_FRAME_RATE) as u32 % WALK_FRAMES;
        let mut query = self
            .world
            .query_filtered::<(&Transform, &Body, &EntityColor, &WalkAnimation), With<Player>>();
        for (transform, body, color, animation) in query.iter(&self.world) {
            let center = transform.ground();
            // Bob on odd walk frames so a moving player reads as walking.
            let bob = if animation.playing && walk_frame % 2 == 1 { 1.1 } else { 1.0 };
            instance_data.push(InstanceData::square(
                center,
                1.0,
                body.half_extent * 2.0 * bob,
                [color.r, color.g, color.b, 1.0],
            ));
            instance_data.push(InstanceData::square(
                center + animation.facing.to_vec2() * body.half_extent * 0.6,
                2.0,
                body.half_extent * 0.6,
                [1.0, 1.0, 1.0, 1.0],
            ));
        }

        let instance_count = instance_data.len().min(self.max_instances);

        // Write instance data to buffer BEFORE render pass
        if !instance_data.is_empty() {
            self.queue.write_buffer(
                &self.instance_buffer,
                0,
                bytemuck::cast_slice(&instance_data[..instance_count]),
            );
        }

        let screen = self.screen();
        let uniforms = Uniforms {
            view_proj: self.camera.view_projection(screen).to_cols_array_2d(),
        };
        self.queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniforms]));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.0,
                            g: 0.0,
                            b: 0.0,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            render_pass.set_pipeline(&self.render_pipeline);
            render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
            render_pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
            render_pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint16);

            // ONE DRAW CALL for tiles and player
            render_pass.draw_indexed(0..self.num_indices, 0, 0..instance_count as u32);
        }

        // ── Overlay layers, projected into egui points ───────────────────────
        let pixels_per_point = self.window.scale_factor() as f32;
        let to_points = |camera: &FollowCamera, point: Vec2| {
            let px = camera.ground_to_screen(point, screen) / pixels_per_point;
            egui::pos2(px.x, px.y)
        };

        let mut path_points = Vec::new();
        let mut body_draws = Vec::new();
        let mut query = self.world.query::<(
            &Transform,
            &Body,
            &Velocity,
            &ObstacleCollider,
            Option<&PathFollower>,
        )>();
        for (transform, body, velocity, collider, follower) in query.iter(&self.world) {
            let pos = transform.ground();
            if let Some(follower) = follower {
                path_points.extend(follower.last_route().iter().map(|&p| to_points(&self.camera, p)));
            }
            if self.show_hitboxes {
                body_draws.push(BodyDebugDraw {
                    pos: to_points(&self.camera, pos),
                    vel_tip: to_points(&self.camera, pos + velocity.ground() * 0.25),
                    half_extent_px: body.half_extent * self.camera.zoom() / pixels_per_point,
                    colliding: collider.active,
                    target: follower
                        .and_then(PathFollower::current_target)
                        .map(|p| to_points(&self.camera, p)),
                });
            }
        }

        let mesh_cells: Option<Vec<MeshCellDraw>> = self.show_mesh.then(|| {
            self.map
                .grid
                .cells()
                .filter(|(_, walkable)| *walkable)
                .map(|(cell, _)| MeshCellDraw {
                    center: to_points(&self.camera, self.map.grid.cell_center(cell)),
                    size_px: self.map.grid.cell_size * self.camera.zoom() / pixels_per_point,
                })
                .collect()
        });

        let stats = self.overlay.visible.then(|| DebugStats {
            fps: self.timer.fps,
            frame_time_avg_ms: self.timer.avg_ms,
            frame_time_min_ms: self.timer.last_min_ms,
            frame_time_max_ms: self.timer.last_max_ms,
            entity_count: self.world.entities().len() as usize,
            draw_calls: 1,
            resolution: (self.size.width, self.size.height),
            camera_target: (self.camera.target().x, self.camera.target().y),
            camera_zoom: self.camera.zoom(),
            pathfinding_ms: self.last_path_ms,
            path_requests: self.path_requests,
        });

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.size.width, self.size.height],
            pixels_per_point,
        };

        self.overlay.render(
            &self.device,
            &self.queue,
            &mut encoder,
            &self.window,
            &view,
            &screen_descriptor,
            &self.status,
            stats.as_ref(),
            self.show_hitboxes.then_some(body_draws.as_slice()),
            (!path_points.is_empty()).then_some(path_points.as_slice()),
            mesh_cells.as_deref(),
        );

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}

// ============================================================================
// TILE INSTANCES
// ============================================================================

/// One flat square per tile; walls dark, floor in a faint checkerboard.
fn build_tile_instances(map: &TileMap) -> Vec<InstanceData> {
    let grid = &map.grid;
    grid.cells()
        .map(|(cell, walkable)| {
            let color = if walkable {
                FLOOR_COLORS[((cell.x + cell.y) % 2) as usize]
            } else {
                WALL_COLOR
            };
            InstanceData::square(grid.cell_center(cell), 0.0, grid.cell_size, color)
        })
        .collect()
}

// ============================================================================
// MAIN
// ============================================================================

fn main() {
    env_logger::init();

    let map = match TileMap::parse(TOWN, TILE_SIZE) {
        Ok(map) => map,
        Err(err) => {
            error!("invalid town layout: {err}");
            std::process::exit(1);
        }
    };

    let event_loop = EventLoop::new().expect("failed to create event loop");

    let window_attributes = Window::default_attributes()
        .with_title("Click to Move")
        .with_inner_size(winit::dpi::LogicalSize::new(750, 750));

    let window = Arc::new(
        event_loop
            .create_window(window_attributes)
            .expect("failed to create window"),
    );

    let mut state = pollster::block_on(State::new(window.clone(), map));

    event_loop.run(move |event, control_flow| {
        match event {
            WinitEvent::WindowEvent {
                ref event,
                window_id,
            } if window_id == window.id() => {
                let response = state.overlay.handle_window_event(&window, event);
                if !response.consumed {
                    state.input.process_event(event);
                }

                match event {
                    WindowEvent::CloseRequested
                    | WindowEvent::KeyboardInput {
                        event:
                            KeyEvent {
                                state: ElementState::Pressed,
                                physical_key: PhysicalKey::Code(KeyCode::Escape),
                                ..
                            },
                        ..
                    } => control_flow.exit(),
                    WindowEvent::Resized(physical_size) => {
                        state.resize(*physical_size);
                    }
                    WindowEvent::RedrawRequested => {
                        state.update();
                        match state.render() {
                            Ok(_) => {}
                            Err(wgpu::SurfaceError::Lost) => state.resize(state.size),
                            Err(wgpu::SurfaceError::OutOfMemory) => control_flow.exit(),
                            Err(e) => warn!("{:?}", e),
                        }
                        state.input.end_frame();
                    }
                    _ => {}
                }
            }
            WinitEvent::AboutToWait => {
                window.request_redraw();
            }
            _ => {}
        }
    }).expect("event loop failed");
}
