use std::sync::Arc;
use std::time::Duration;

use eframe::egui::{self, Color32, RichText, Sense, TextureHandle};

use crate::catalog::CatalogSource;
use crate::controller::{FetchTicket, FetchWorker, QueryController};
use crate::images::{ImageCache, ImageSize, ImageState};
use crate::presentation::{
    page_position, page_strip, result_summary, show_page_strip, PageSlot, ResultView,
    EMPTY_HINT, EMPTY_TITLE,
};
use crate::query::{Facet, FluorescenceFilter, QueryState};
use crate::specimen::{is_plain_fluorescence_tag, CategoryIndex, Specimen};
use crate::viewer::{DetailViewer, DismissReason, ScrollGate};

const APP_TITLE: &str = "Specimen Browser";
const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
const CARD_WIDTH: f32 = 220.0;
const CARD_IMAGE_SIDE: f32 = 208.0;
const CARD_MINERAL_BADGES: usize = 2;
const DETAIL_THUMB_SIDE: f32 = 56.0;

const ACCENT: Color32 = Color32::from_rgb(196, 160, 72);
const ERROR_FILL: Color32 = Color32::from_rgb(64, 18, 18);
const ERROR_TEXT: Color32 = Color32::from_rgb(248, 180, 180);
const SKELETON_FILL: Color32 = Color32::from_gray(34);

#[derive(Debug, Clone, PartialEq, Eq)]
enum GalleryAction {
    SetFacet(Facet, String),
    SetFluorescence(Option<FluorescenceFilter>),
    Search(String),
    ClearFilters,
    Retry,
    GoToPage(u32),
    OpenDetail(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum DetailAction {
    Dismiss(DismissReason),
    Next,
    Previous,
    SelectThumbnail(usize),
    OpenFullSize(String),
}

pub struct SpecimenBrowserApp {
    controller: QueryController,
    worker: FetchWorker,
    categories: CategoryIndex,
    images: ImageCache,
    scroll_gate: ScrollGate,
    viewer: Option<DetailViewer>,
    search_input: String,
    status_line: String,
    scroll_to_top: bool,
    started: bool,
}

impl SpecimenBrowserApp {
    pub fn new(
        source: Arc<dyn CatalogSource>,
        initial_query: QueryState,
        initial_status: Option<String>,
    ) -> Self {
        Self {
            search_input: initial_query.search().to_string(),
            controller: QueryController::new(initial_query),
            worker: FetchWorker::new(source),
            categories: CategoryIndex::default(),
            images: ImageCache::new(),
            scroll_gate: ScrollGate::default(),
            viewer: None,
            status_line: initial_status.unwrap_or_default(),
            scroll_to_top: false,
            started: false,
        }
    }

    fn apply_dark_background(ctx: &egui::Context) {
        let mut visuals = egui::Visuals::dark();
        let line_base = Color32::from_gray(40);

        visuals.panel_fill = Color32::from_gray(14);
        visuals.window_fill = Color32::from_gray(20);
        visuals.extreme_bg_color = Color32::from_gray(8);
        visuals.window_stroke = egui::Stroke::new(1.0, line_base);
        visuals.widgets.noninteractive.bg_stroke = egui::Stroke::new(1.0, line_base);
        visuals.selection.bg_fill = ACCENT.linear_multiply(0.6);
        ctx.set_visuals(visuals);
    }

    /// Both startup fetches go out together; neither waits on the other.
    fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        self.worker.spawn_categories();
        let ticket = self.controller.refresh();
        self.dispatch(ticket);
    }

    fn dispatch(&mut self, ticket: FetchTicket) {
        log::debug!(
            "Requesting specimens (generation {}): {:?}",
            ticket.generation,
            ticket.descriptor
        );
        self.images.drop_queued();
        self.worker.spawn_specimens(ticket);
    }

    fn is_loading(&self) -> bool {
        self.controller.is_loading() || self.worker.has_pending()
    }

    fn poll(&mut self, ctx: &egui::Context) {
        if let Some(categories) = self.worker.poll_categories() {
            log::info!(
                "Loaded categories: {} minerals, {} locations, {} colors",
                categories.minerals.len(),
                categories.locations.len(),
                categories.colors.len()
            );
            self.categories = categories;
        }
        self.worker.poll_specimens(&mut self.controller);
        self.images.poll(ctx);

        if self.worker.has_pending() {
            ctx.request_repaint_after(Duration::from_millis(16));
        }
    }

    fn apply_action(&mut self, action: GalleryAction) {
        let ticket = match action {
            GalleryAction::SetFacet(facet, value) => Some(self.controller.set_facet(facet, value)),
            GalleryAction::SetFluorescence(filter) => {
                Some(self.controller.set_fluorescence(filter))
            }
            GalleryAction::Search(text) => Some(self.controller.set_search(text)),
            GalleryAction::ClearFilters => {
                self.search_input.clear();
                Some(self.controller.clear_filters())
            }
            GalleryAction::Retry => self.controller.retry(),
            GalleryAction::GoToPage(page) => {
                let ticket = self.controller.go_to_page(page);
                if ticket.is_some() {
                    self.scroll_to_top = true;
                }
                ticket
            }
            GalleryAction::OpenDetail(index) => {
                if let Some(specimen) = self.controller.items().get(index).cloned() {
                    self.open_detail(specimen);
                }
                None
            }
        };
        if let Some(ticket) = ticket {
            self.dispatch(ticket);
        }
    }

    fn open_detail(&mut self, specimen: Specimen) {
        log::debug!("Opening specimen {}", specimen.id);
        // Release any previous viewer before acquiring the new guard.
        self.viewer = None;
        self.viewer = Some(DetailViewer::open(specimen, &self.scroll_gate));
    }

    fn close_detail(&mut self, reason: DismissReason) {
        if let Some(viewer) = self.viewer.take() {
            log::debug!("Closing specimen {} ({reason:?})", viewer.specimen().id);
        }
    }

    fn apply_detail_action(&mut self, action: DetailAction, ctx: &egui::Context) {
        match action {
            DetailAction::Dismiss(reason) => self.close_detail(reason),
            DetailAction::OpenFullSize(url) => ctx.open_url(egui::OpenUrl::new_tab(url)),
            other => {
                let Some(viewer) = self.viewer.as_mut() else {
                    return;
                };
                match other {
                    DetailAction::Next => viewer.next(),
                    DetailAction::Previous => viewer.previous(),
                    DetailAction::SelectThumbnail(index) => viewer.select_thumbnail(index),
                    DetailAction::Dismiss(_) | DetailAction::OpenFullSize(_) => {}
                }
            }
        }
    }

    fn show_filter_panel(&mut self, ui: &mut egui::Ui, actions: &mut Vec<GalleryAction>) {
        ui.add_space(6.0);
        ui.horizontal(|ui| {
            ui.label(RichText::new("Search").monospace());
            let response = ui.add(
                egui::TextEdit::singleline(&mut self.search_input)
                    .hint_text("Search specimens by name, description, or tags...")
                    .desired_width(ui.available_width()),
            );
            if response.changed() {
                actions.push(GalleryAction::Search(self.search_input.clone()));
            }
        });
        ui.add_space(4.0);

        let query = self.controller.query();
        ui.horizontal_wrapped(|ui| {
            for facet in Facet::ALL {
                let options = match facet {
                    Facet::Mineral => &self.categories.minerals,
                    Facet::Location => &self.categories.locations,
                    Facet::Color => &self.categories.colors,
                };
                let current = query.filters().facet(facet).to_string();
                let mut selected = current.clone();
                ui.label(RichText::new(facet.label()).monospace());
                egui::ComboBox::from_id_salt(("facet-filter", facet.param_name()))
                    .width(170.0)
                    .selected_text(if selected.is_empty() {
                        facet.any_label().to_string()
                    } else {
                        selected.clone()
                    })
                    .show_ui(ui, |ui| {
                        ui.selectable_value(&mut selected, String::new(), facet.any_label());
                        for option in options {
                            ui.selectable_value(&mut selected, option.clone(), option.as_str());
                        }
                    });
                if selected != current {
                    actions.push(GalleryAction::SetFacet(facet, selected));
                }
                ui.add_space(8.0);
            }

            let current = query.filters().fluorescence;
            let mut selected = current;
            ui.label(RichText::new("Fluorescence").monospace());
            egui::ComboBox::from_id_salt("fluorescence-filter")
                .width(170.0)
                .selected_text(
                    selected
                        .map(FluorescenceFilter::label)
                        .unwrap_or(FluorescenceFilter::ANY_LABEL),
                )
                .show_ui(ui, |ui| {
                    ui.selectable_value(&mut selected, None, FluorescenceFilter::ANY_LABEL);
                    for filter in FluorescenceFilter::ALL {
                        ui.selectable_value(&mut selected, Some(filter), filter.label());
                    }
                });
            if selected != current {
                actions.push(GalleryAction::SetFluorescence(selected));
            }

            if query.has_active_filters() {
                ui.add_space(8.0);
                if ui.button("✕ Clear Filters").clicked() {
                    actions.push(GalleryAction::ClearFilters);
                }
            }
        });
        ui.add_space(6.0);
    }

    fn show_results(
        ui: &mut egui::Ui,
        controller: &QueryController,
        images: &mut ImageCache,
        actions: &mut Vec<GalleryAction>,
    ) {
        let view = ResultView::from_state(
            controller.is_loading(),
            controller.error(),
            controller.items(),
        );
        match view {
            ResultView::Loading { placeholders } => {
                ui.horizontal_wrapped(|ui| {
                    for _ in 0..placeholders {
                        Self::show_skeleton_card(ui);
                    }
                });
            }
            ResultView::Failed { message } => {
                egui::Frame::none()
                    .fill(ERROR_FILL)
                    .stroke(egui::Stroke::new(1.0, ERROR_TEXT.linear_multiply(0.4)))
                    .rounding(6.0)
                    .inner_margin(egui::Margin::same(14.0))
                    .show(ui, |ui| {
                        ui.set_width(ui.available_width());
                        ui.label(
                            RichText::new("Error Loading Specimens")
                                .strong()
                                .color(ERROR_TEXT),
                        );
                        ui.label(RichText::new(message).color(ERROR_TEXT));
                        ui.add_space(6.0);
                        if ui.button("Try Again").clicked() {
                            actions.push(GalleryAction::Retry);
                        }
                    });
            }
            ResultView::Empty => {
                ui.vertical_centered(|ui| {
                    ui.add_space(48.0);
                    ui.label(RichText::new(EMPTY_TITLE).size(22.0).strong());
                    ui.label(RichText::new(EMPTY_HINT).color(Color32::GRAY));
                    ui.add_space(12.0);
                    if ui.button("Clear All Filters").clicked() {
                        actions.push(GalleryAction::ClearFilters);
                    }
                });
            }
            ResultView::Grid(items) => {
                ui.horizontal_wrapped(|ui| {
                    ui.spacing_mut().item_spacing = egui::vec2(14.0, 14.0);
                    for (index, specimen) in items.iter().enumerate() {
                        if Self::show_specimen_card(ui, specimen, images) {
                            actions.push(GalleryAction::OpenDetail(index));
                        }
                    }
                });
            }
        }

        let totals = controller.totals();
        if show_page_strip(controller.is_loading(), controller.error(), totals.total_pages) {
            ui.add_space(16.0);
            Self::draw_page_strip(ui, controller.query().page(), totals.total_pages, actions);
        }
    }

    fn show_skeleton_card(ui: &mut egui::Ui) {
        egui::Frame::group(ui.style()).show(ui, |ui| {
            ui.set_width(CARD_WIDTH);
            let (image_rect, _) =
                ui.allocate_exact_size(egui::vec2(CARD_IMAGE_SIDE, CARD_IMAGE_SIDE), Sense::hover());
            ui.painter().rect_filled(image_rect, 4.0, SKELETON_FILL);
            for fraction in [0.75_f32, 0.5] {
                let (line_rect, _) = ui
                    .allocate_exact_size(egui::vec2(CARD_IMAGE_SIDE * fraction, 14.0), Sense::hover());
                ui.painter().rect_filled(line_rect, 3.0, SKELETON_FILL);
            }
        });
    }

    fn show_specimen_card(ui: &mut egui::Ui, specimen: &Specimen, images: &mut ImageCache) -> bool {
        let frame = egui::Frame::group(ui.style()).show(ui, |ui| {
            ui.set_width(CARD_WIDTH);
            let texture = specimen
                .primary_image_url()
                .map(|url| images.get(url, ImageSize::Thumb));
            let image_rect = Self::paint_fitted_image(
                ui,
                texture.as_ref(),
                egui::vec2(CARD_IMAGE_SIDE, CARD_IMAGE_SIDE),
            );
            if specimen.is_fluorescent() {
                let badge_pos = image_rect.right_top() + egui::vec2(-8.0, 8.0);
                ui.painter().text(
                    badge_pos,
                    egui::Align2::RIGHT_TOP,
                    "✦ Fluorescent",
                    egui::FontId::proportional(12.0),
                    ACCENT,
                );
            }

            ui.add(egui::Label::new(RichText::new(&specimen.name).strong()).truncate());
            if let Some(location) = specimen.location() {
                ui.add(
                    egui::Label::new(RichText::new(location).small().color(Color32::GRAY))
                        .truncate(),
                );
            }
            let badges = specimen.mineral_badges(CARD_MINERAL_BADGES);
            if !badges.shown.is_empty() {
                ui.horizontal_wrapped(|ui| {
                    for mineral in badges.shown {
                        ui.label(RichText::new(mineral).small().background_color(
                            Color32::from_gray(40),
                        ));
                    }
                    if badges.overflow > 0 {
                        ui.label(RichText::new(format!("+{}", badges.overflow)).small());
                    }
                });
            }
        });

        let response = frame.response.interact(Sense::click());
        if response.hovered() {
            ui.ctx().set_cursor_icon(egui::CursorIcon::PointingHand);
        }
        response.clicked()
    }

    /// Letterboxes the texture into a box of `size`; draws a placeholder while
    /// the image is missing or still downloading.
    fn paint_fitted_image(
        ui: &mut egui::Ui,
        state: Option<&ImageState>,
        size: egui::Vec2,
    ) -> egui::Rect {
        let (rect, _) = ui.allocate_exact_size(size, Sense::hover());
        ui.painter().rect_filled(rect, 4.0, Color32::BLACK);
        match state {
            Some(ImageState::Ready(texture)) => {
                let draw_rect = fitted_rect(rect, texture);
                ui.painter().image(
                    texture.id(),
                    draw_rect,
                    egui::Rect::from_min_max(egui::Pos2::ZERO, egui::pos2(1.0, 1.0)),
                    Color32::WHITE,
                );
            }
            Some(ImageState::Loading) => {
                ui.painter().rect_filled(rect, 4.0, SKELETON_FILL);
            }
            Some(ImageState::Failed) | None => {
                ui.painter().text(
                    rect.center(),
                    egui::Align2::CENTER_CENTER,
                    "No image",
                    egui::FontId::proportional(13.0),
                    Color32::GRAY,
                );
            }
        }
        rect
    }

    fn draw_page_strip(
        ui: &mut egui::Ui,
        current: u32,
        total_pages: u32,
        actions: &mut Vec<GalleryAction>,
    ) {
        let strip = page_strip(total_pages, current);
        ui.vertical_centered(|ui| {
            ui.horizontal(|ui| {
                if ui
                    .add_enabled(strip.prev_enabled, egui::Button::new("Previous"))
                    .clicked()
                {
                    actions.push(GalleryAction::GoToPage(current.saturating_sub(1)));
                }
                for slot in &strip.slots {
                    match *slot {
                        PageSlot::Page {
                            number,
                            current: is_current,
                        } => {
                            let label = RichText::new(number.to_string());
                            let button = if is_current {
                                egui::Button::new(label.strong()).fill(ACCENT.linear_multiply(0.5))
                            } else {
                                egui::Button::new(label)
                            };
                            if ui.add(button).clicked() {
                                actions.push(GalleryAction::GoToPage(number));
                            }
                        }
                        PageSlot::Ellipsis => {
                            ui.label(RichText::new("...").color(Color32::GRAY));
                        }
                    }
                }
                if ui
                    .add_enabled(strip.next_enabled, egui::Button::new("Next"))
                    .clicked()
                {
                    actions.push(GalleryAction::GoToPage(current.saturating_add(1)));
                }
            });
        });
    }

    fn show_detail_modal(&mut self, ctx: &egui::Context) -> Vec<DetailAction> {
        let mut detail_actions = Vec::new();
        let Some(viewer) = self.viewer.as_ref() else {
            return detail_actions;
        };
        let images = &mut self.images;
        let screen = ctx.screen_rect();
        let modal_width = (screen.width() * 0.85).clamp(360.0, 1180.0);
        let image_side = (modal_width * 0.62).min(screen.height() * 0.7);

        let modal = egui::Modal::new(egui::Id::new("specimen-detail")).show(ctx, |ui| {
            ui.set_width(modal_width);
            ui.horizontal(|ui| {
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("X").on_hover_text("Close").clicked() {
                        detail_actions.push(DetailAction::Dismiss(DismissReason::CloseButton));
                    }
                });
            });

            ui.horizontal_top(|ui| {
                ui.vertical(|ui| {
                    ui.set_width(image_side);
                    Self::show_detail_images(ui, viewer, images, image_side, &mut detail_actions);
                });
                ui.add_space(16.0);
                egui::ScrollArea::vertical()
                    .id_salt("specimen-detail-text")
                    .max_height(image_side + DETAIL_THUMB_SIDE)
                    .show(ui, |ui| Self::show_detail_text(ui, viewer.specimen()));
            });
        });

        if modal.backdrop_response.clicked() {
            detail_actions.push(DetailAction::Dismiss(DismissReason::Backdrop));
        }
        detail_actions
    }

    fn show_detail_images(
        ui: &mut egui::Ui,
        viewer: &DetailViewer,
        images: &mut ImageCache,
        image_side: f32,
        actions: &mut Vec<DetailAction>,
    ) {
        let Some(url) = viewer.current_image() else {
            Self::paint_fitted_image(ui, None, egui::vec2(image_side, image_side));
            return;
        };

        let state = images.get(url, ImageSize::Full);
        let image_rect = Self::paint_fitted_image(ui, Some(&state), egui::vec2(image_side, image_side));
        let response = ui
            .interact(image_rect, ui.id().with("detail-image"), Sense::click())
            .on_hover_text("Click to view full size");
        if response.clicked() {
            actions.push(DetailAction::OpenFullSize(url.to_string()));
        }

        if !viewer.has_carousel() {
            return;
        }

        ui.horizontal(|ui| {
            if ui.button("◀").on_hover_text("Previous image").clicked() {
                actions.push(DetailAction::Previous);
            }
            if let Some(counter) = viewer.counter_label() {
                ui.monospace(counter);
            }
            if ui.button("▶").on_hover_text("Next image").clicked() {
                actions.push(DetailAction::Next);
            }
        });

        egui::ScrollArea::horizontal()
            .id_salt("specimen-detail-thumbs")
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    for (index, thumb_url) in viewer.specimen().images.iter().enumerate() {
                        let state = images.get(thumb_url, ImageSize::Thumb);
                        let rect = Self::paint_fitted_image(
                            ui,
                            Some(&state),
                            egui::vec2(DETAIL_THUMB_SIDE, DETAIL_THUMB_SIDE),
                        );
                        let stroke_color = if index == viewer.cursor() {
                            ACCENT
                        } else {
                            Color32::from_gray(70)
                        };
                        ui.painter().rect_stroke(
                            rect,
                            4.0,
                            egui::Stroke::new(2.0, stroke_color),
                        );
                        if ui
                            .interact(rect, ui.id().with(("detail-thumb", index)), Sense::click())
                            .clicked()
                        {
                            actions.push(DetailAction::SelectThumbnail(index));
                        }
                    }
                });
            });
    }

    fn show_detail_text(ui: &mut egui::Ui, specimen: &Specimen) {
        ui.heading(RichText::new(&specimen.name).strong());
        if let Some(location) = specimen.location() {
            ui.label(RichText::new(location).color(Color32::GRAY));
        }

        if let Some(description) = specimen.description() {
            ui.add_space(10.0);
            ui.label(RichText::new("Description").strong());
            ui.label(description);
        }

        let sections = [
            ("Mineral Composition", &specimen.minerals),
            ("Colors", &specimen.colors),
        ];
        for (title, values) in sections {
            if values.is_empty() {
                continue;
            }
            ui.add_space(10.0);
            ui.label(RichText::new(title).strong());
            ui.horizontal_wrapped(|ui| {
                for value in values {
                    ui.label(RichText::new(value).background_color(Color32::from_gray(40)));
                }
            });
        }

        if specimen.is_fluorescent() {
            ui.add_space(10.0);
            ui.label(RichText::new("Fluorescence ✦").strong());
            ui.horizontal_wrapped(|ui| {
                for tag in specimen.fluorescence_tags() {
                    let text = RichText::new(tag);
                    if is_plain_fluorescence_tag(tag) {
                        ui.label(text);
                    } else {
                        ui.label(text.color(Color32::BLACK).background_color(ACCENT));
                    }
                }
            });
        }

        if let Some(added) = specimen.added_on() {
            ui.add_space(10.0);
            ui.separator();
            ui.label(RichText::new(format!("Added: {added}")).small().monospace());
        }
    }
}

fn fitted_rect(bounds: egui::Rect, texture: &TextureHandle) -> egui::Rect {
    let image_size = texture.size_vec2();
    if image_size.x <= 0.0 || image_size.y <= 0.0 {
        return bounds;
    }
    let scale = (bounds.width() / image_size.x)
        .min(bounds.height() / image_size.y)
        .max(0.01);
    egui::Rect::from_center_size(bounds.center(), image_size * scale)
}

impl eframe::App for SpecimenBrowserApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        Self::apply_dark_background(ctx);
        self.start();
        self.poll(ctx);

        let mut escape_pressed = false;
        let mut carousel_step = None;
        if self.viewer.is_some() {
            ctx.input_mut(|input| {
                escape_pressed = input.consume_key(egui::Modifiers::NONE, egui::Key::Escape);
                if input.consume_key(egui::Modifiers::NONE, egui::Key::ArrowRight) {
                    carousel_step = Some(DetailAction::Next);
                } else if input.consume_key(egui::Modifiers::NONE, egui::Key::ArrowLeft) {
                    carousel_step = Some(DetailAction::Previous);
                }
            });
        }
        if escape_pressed {
            self.close_detail(DismissReason::Escape);
        } else if let Some(step) = carousel_step {
            self.apply_detail_action(step, ctx);
        }

        let mut actions = Vec::new();
        let title_text = format!("{APP_TITLE} v{APP_VERSION}");
        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(RichText::new(&title_text).monospace().size(16.0));
                if !self.status_line.is_empty() {
                    ui.separator();
                    ui.label(RichText::new(&self.status_line).small().color(Color32::GRAY));
                }
                if self.is_loading() {
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        ui.spinner();
                    });
                }
            });
            self.show_filter_panel(ui, &mut actions);
        });

        let scroll_enabled = !self.scroll_gate.is_suspended();
        let scroll_to_top = std::mem::take(&mut self.scroll_to_top);
        egui::CentralPanel::default().show(ctx, |ui| {
            let controller = &self.controller;
            if !controller.is_loading() {
                let totals = controller.totals();
                ui.horizontal(|ui| {
                    ui.label(RichText::new(result_summary(totals.total)).strong());
                    if let Some(position) =
                        page_position(controller.query().page(), totals.total_pages)
                    {
                        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                            ui.label(RichText::new(position).small().color(Color32::GRAY));
                        });
                    }
                });
                ui.add_space(8.0);
            }

            let mut scroll_area = egui::ScrollArea::vertical()
                .id_salt("specimen-gallery")
                .auto_shrink([false, false])
                .enable_scrolling(scroll_enabled);
            if scroll_to_top {
                scroll_area = scroll_area.vertical_scroll_offset(0.0);
            }
            scroll_area.show(ui, |ui| {
                Self::show_results(ui, controller, &mut self.images, &mut actions);
            });
        });

        let detail_actions = self.show_detail_modal(ctx);
        for action in detail_actions {
            self.apply_detail_action(action, ctx);
        }
        for action in actions {
            self.apply_action(action);
        }

        if self.is_loading() || self.images.is_loading() {
            ctx.set_cursor_icon(egui::CursorIcon::Progress);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::controller::tests::{page_of, FakeCatalog};
    use crate::controller::FetchPhase;

    fn app_with(pages: Vec<Result<crate::catalog::SpecimenPage, String>>) -> SpecimenBrowserApp {
        let fake = FakeCatalog {
            pages: Mutex::new(pages),
            ..FakeCatalog::default()
        };
        SpecimenBrowserApp::new(Arc::new(fake), QueryState::default(), None)
    }

    fn settle(app: &mut SpecimenBrowserApp) {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while app.worker.has_pending() {
            assert!(std::time::Instant::now() < deadline, "fetch never completed");
            app.worker.poll_specimens(&mut app.controller);
            if let Some(categories) = app.worker.poll_categories() {
                app.categories = categories;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn empty_result_offers_clear_all_filters() {
        let mut app = app_with(vec![Ok(page_of(0, 0, 0)), Ok(page_of(0, 0, 0))]);
        app.start();
        settle(&mut app);

        app.apply_action(GalleryAction::SetFacet(Facet::Mineral, "Unobtainium".into()));
        app.search_input = "zzz".to_string();
        app.apply_action(GalleryAction::Search("zzz".into()));
        app.apply_action(GalleryAction::SetFluorescence(Some(FluorescenceFilter::Midwave)));
        settle(&mut app);

        let view = ResultView::from_state(
            app.controller.is_loading(),
            app.controller.error(),
            app.controller.items(),
        );
        assert_eq!(view, ResultView::Empty);
        assert_eq!(result_summary(app.controller.totals().total), EMPTY_TITLE);

        app.apply_action(GalleryAction::ClearFilters);
        assert!(!app.controller.query().has_active_filters());
        assert_eq!(app.controller.query().page(), 1);
        assert!(app.search_input.is_empty());
        settle(&mut app);
    }

    #[test]
    fn retry_after_failure_reissues_last_request() {
        let mut app = app_with(vec![Err("boom".to_string()), Ok(page_of(2, 2, 1))]);
        app.start();
        settle(&mut app);
        assert!(matches!(app.controller.phase(), FetchPhase::Error(_)));
        let failed = app.controller.last_request().cloned();

        app.apply_action(GalleryAction::Retry);
        assert_eq!(app.controller.last_request().cloned(), failed);
        settle(&mut app);
        assert_eq!(app.controller.phase(), &FetchPhase::Idle);
        assert_eq!(app.controller.items().len(), 2);
    }

    #[test]
    fn every_dismissal_path_restores_scroll_once() {
        let mut app = app_with(vec![Ok(page_of(3, 3, 1))]);
        app.start();
        settle(&mut app);

        for reason in [
            DismissReason::CloseButton,
            DismissReason::Backdrop,
            DismissReason::Escape,
        ] {
            app.apply_action(GalleryAction::OpenDetail(1));
            assert!(app.scroll_gate.is_suspended());
            app.close_detail(reason);
            assert!(!app.scroll_gate.is_suspended());
            app.close_detail(reason);
            assert!(!app.scroll_gate.is_suspended());
        }
    }

    #[test]
    fn reopening_replaces_viewer_without_leaking_suspension() {
        let mut app = app_with(vec![Ok(page_of(3, 3, 1))]);
        app.start();
        settle(&mut app);

        app.apply_action(GalleryAction::OpenDetail(0));
        app.apply_action(GalleryAction::OpenDetail(2));
        assert_eq!(
            app.viewer.as_ref().map(|viewer| viewer.specimen().id.as_str()),
            Some("2")
        );
        app.close_detail(DismissReason::Escape);
        assert!(!app.scroll_gate.is_suspended());
    }

    #[test]
    fn page_navigation_requests_scroll_reset() {
        let mut app = app_with(vec![Ok(page_of(20, 45, 3)), Ok(page_of(20, 45, 3))]);
        app.start();
        settle(&mut app);

        app.apply_action(GalleryAction::GoToPage(2));
        assert!(app.scroll_to_top);
        assert_eq!(app.controller.last_request().map(|d| d.page), Some(2));
        settle(&mut app);
    }
}
