#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use std::path::PathBuf;
use std::sync::Arc;

use iced::widget::scrollable::{Direction, Properties};
use iced::widget::{
    button, column, container, image as iced_image, mouse_area, pick_list, progress_bar, row,
    scrollable, text, Space,
};
use iced::{
    event, executor, font, theme, window, Alignment, Application, Background, Color, Command,
    Element, Event, Font, Length, Settings, Size, Subscription, Theme,
};
use image::GenericImageView;
use rfd::{AsyncFileDialog, AsyncMessageDialog, MessageButtons, MessageLevel};
use tracing::{error, info, warn};

use image_upscaler::job::SUPPORTED_EXTENSIONS;
use image_upscaler::save::{save_copy, SAVE_FILTERS};
use image_upscaler::{
    logging, DropOutcome, DropZone, JobEvent, JobHandle, JobRunner, OnnxLoader, ScaleFactor,
    Session, Upscaler, UpscalerConfig,
};

const HEADING_FONT: Font = Font {
    weight: font::Weight::Bold,
    ..Font::DEFAULT
};

const BODY_FONT: Font = Font::DEFAULT;

// Theme colors
const PRIMARY_COLOR: Color = Color::from_rgb(0.2, 0.5, 0.9);
const BACKGROUND_COLOR: Color = Color::from_rgb(0.97, 0.97, 0.98);
const CARD_COLOR: Color = Color::WHITE;
const TEXT_COLOR: Color = Color::from_rgb(0.2, 0.2, 0.3);
const TEXT_SECONDARY: Color = Color::from_rgb(0.4, 0.4, 0.5);
const DROP_IDLE: Color = Color::from_rgb(0.89, 0.95, 0.99);
const DROP_IDLE_BORDER: Color = Color::from_rgb(0.13, 0.59, 0.95);
const DROP_ACCEPT: Color = Color::from_rgb(0.91, 0.96, 0.91);
const DROP_ACCEPT_BORDER: Color = Color::from_rgb(0.3, 0.69, 0.31);

pub fn main() -> iced::Result {
    let config = UpscalerConfig::default();
    if let Err(e) = logging::init(&config.log_file) {
        eprintln!("File logging disabled: {:#}", e);
    }

    let mut settings = Settings::with_flags(config);
    settings.window.size = Size::new(1200.0, 800.0);
    settings.default_font = BODY_FONT;
    settings.default_text_size = 14.into();
    App::run(settings)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Before,
    After,
}

/// A decoded image ready for display.
#[derive(Debug, Clone)]
struct Preview {
    path: PathBuf,
    handle: iced_image::Handle,
    width: u32,
    height: u32,
}

#[derive(Debug, Clone)]
enum Message {
    BrowseFile,
    FileSelected(Option<PathBuf>),
    FileHovered(PathBuf),
    FileDropped(PathBuf),
    FilesHoveredLeft,
    ScaleSelected(ScaleFactor),
    Process,
    Job(Option<JobEvent>),
    PreviewLoaded(Side, Result<Preview, String>),
    Save,
    SaveTargetChosen(Option<PathBuf>),
    SaveComplete(Result<PathBuf, String>),
    DialogClosed,
    ZoomIn,
    ZoomOut,
    ResetZoom,
}

struct App {
    session: Session,
    runner: JobRunner,
    job: Option<JobHandle>,
    drop_zone: DropZone,
    before_image: Option<Preview>,
    after_image: Option<Preview>,
    status_message: String,
    zoom_level: f32,
}

impl Application for App {
    type Executor = executor::Default;
    type Message = Message;
    type Theme = Theme;
    type Flags = UpscalerConfig;

    fn new(config: UpscalerConfig) -> (Self, Command<Message>) {
        info!("Models cached in {}", config.models_dir.display());
        let upscaler = Upscaler::new(Arc::new(OnnxLoader::new(config)));

        (
            Self {
                session: Session::default(),
                runner: JobRunner::new(upscaler),
                job: None,
                drop_zone: DropZone::default(),
                before_image: None,
                after_image: None,
                status_message: "Ready - Drop an image to get started".to_string(),
                zoom_level: 1.0,
            },
            Command::none(),
        )
    }

    fn title(&self) -> String {
        "AI Image Upscaler".to_string()
    }

    fn update(&mut self, message: Message) -> Command<Message> {
        match message {
            Message::BrowseFile => {
                if self.session.is_processing() {
                    return Command::none();
                }
                return Command::perform(
                    async {
                        AsyncFileDialog::new()
                            .set_title("Select Image File")
                            .add_filter("Image Files", &SUPPORTED_EXTENSIONS)
                            .pick_file()
                            .await
                            .map(|f| f.path().to_path_buf())
                    },
                    Message::FileSelected,
                );
            }
            Message::FileSelected(path) => {
                if let Some(path) = path {
                    return self.load_input(path);
                }
            }
            Message::FileHovered(path) => {
                self.drop_zone.hover(path);
            }
            Message::FilesHoveredLeft => {
                self.drop_zone.leave();
            }
            Message::FileDropped(path) => match self.drop_zone.drop_file(path) {
                Some(DropOutcome::Accepted(path)) => return self.load_input(path),
                Some(DropOutcome::Rejected(reason)) => {
                    warn!("{}", reason);
                    self.status_message = reason;
                }
                None => {}
            },
            Message::ScaleSelected(scale) => {
                self.session.set_scale(scale);
            }
            Message::Process => {
                let Some(job) = self.session.begin() else {
                    return Command::none();
                };

                match self.runner.start(job) {
                    Ok(handle) => {
                        self.status_message = "Upscaling image...".to_string();
                        self.job = Some(handle.clone());
                        return Command::perform(handle.next_event(), Message::Job);
                    }
                    Err(e) => {
                        return self.job_failed(format!("Error during upscaling: {}", e));
                    }
                }
            }
            Message::Job(Some(event)) => {
                self.session.apply(event.clone());
                match event {
                    JobEvent::Progress(_) => {
                        if let Some(handle) = &self.job {
                            return Command::perform(handle.clone().next_event(), Message::Job);
                        }
                    }
                    JobEvent::Finished(output) => {
                        self.job = None;
                        self.status_message = "Upscaling completed successfully!".to_string();
                        return Command::perform(load_preview(output), |r| {
                            Message::PreviewLoaded(Side::After, r)
                        });
                    }
                    JobEvent::Failed(message) => {
                        self.job = None;
                        self.status_message = "Upscaling failed".to_string();
                        return show_dialog(MessageLevel::Error, "Error", message);
                    }
                }
            }
            Message::Job(None) => {
                if self.session.is_processing() {
                    return self.job_failed(
                        "Error during upscaling: worker exited unexpectedly".to_string(),
                    );
                }
            }
            Message::PreviewLoaded(side, result) => match result {
                Ok(preview) => {
                    let current = match side {
                        Side::Before => self.session.input().map(|i| i.path()),
                        Side::After => self.session.output(),
                    };
                    // Ignore previews for an image that has since been replaced.
                    if current == Some(preview.path.as_path()) {
                        match side {
                            Side::Before => self.before_image = Some(preview),
                            Side::After => self.after_image = Some(preview),
                        }
                    }
                }
                Err(e) => {
                    error!("Preview failed: {}", e);
                    self.status_message = format!("Preview failed: {}", e);
                }
            },
            Message::Save => {
                let Some(output) = self.session.output() else {
                    return Command::none();
                };
                let file_name = output
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();

                return Command::perform(
                    async move {
                        let mut dialog = AsyncFileDialog::new()
                            .set_title("Save Upscaled Image")
                            .set_file_name(file_name);
                        for (name, extensions) in SAVE_FILTERS {
                            dialog = dialog.add_filter(name, extensions);
                        }
                        dialog.save_file().await.map(|f| f.path().to_path_buf())
                    },
                    Message::SaveTargetChosen,
                );
            }
            Message::SaveTargetChosen(destination) => {
                let (Some(destination), Some(output)) = (destination, self.session.output()) else {
                    return Command::none();
                };
                let output = output.to_path_buf();

                return Command::perform(
                    async move {
                        tokio::task::spawn_blocking(move || {
                            save_copy(&output, &destination)
                                .map(|_| destination)
                                .map_err(|e| e.to_string())
                        })
                        .await
                        .map_err(|e| format!("Task join error: {}", e))?
                    },
                    Message::SaveComplete,
                );
            }
            Message::SaveComplete(result) => match result {
                Ok(destination) => {
                    let name = destination
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    self.status_message = format!("Saved: {}", name);
                    return show_dialog(
                        MessageLevel::Info,
                        "Success",
                        format!("Image saved successfully to:\n{}", destination.display()),
                    );
                }
                Err(e) => {
                    error!("{}", e);
                    return show_dialog(
                        MessageLevel::Error,
                        "Error",
                        format!("Failed to save image:\n{}", e),
                    );
                }
            },
            Message::DialogClosed => {}
            Message::ZoomIn => {
                self.zoom_level = (self.zoom_level * 1.2).min(5.0);
            }
            Message::ZoomOut => {
                self.zoom_level = (self.zoom_level / 1.2).max(0.1);
            }
            Message::ResetZoom => {
                self.zoom_level = 1.0;
            }
        }

        Command::none()
    }

    fn subscription(&self) -> Subscription<Message> {
        event::listen_with(|event, _status| match event {
            Event::Window(_, window::Event::FileHovered(path)) => Some(Message::FileHovered(path)),
            Event::Window(_, window::Event::FileDropped(path)) => Some(Message::FileDropped(path)),
            Event::Window(_, window::Event::FilesHoveredLeft) => Some(Message::FilesHoveredLeft),
            _ => None,
        })
    }

    fn view(&self) -> Element<Message> {
        let header = container(
            column![
                text("AI Image Upscaler")
                    .size(16)
                    .font(HEADING_FONT)
                    .style(Color::WHITE),
                text("Real-ESRGAN super-resolution at 2x, 3x or 4x")
                    .size(11)
                    .font(BODY_FONT)
                    .style(Color::from_rgba(1.0, 1.0, 1.0, 0.8)),
            ]
            .spacing(4),
        )
        .width(Length::Fill)
        .padding([18, 26])
        .style(theme::Container::Custom(Box::new(GradientContainer)));

        let drop_label = match self.session.input() {
            Some(input) if !self.drop_zone.is_hovered() => {
                format!("{}\nDrop or click to choose another image", input.file_name())
            }
            _ => "Drag & Drop Image Here\nor Click to Browse".to_string(),
        };
        let drop_zone = mouse_area(
            container(
                text(drop_label)
                    .size(16)
                    .font(HEADING_FONT)
                    .horizontal_alignment(iced::alignment::Horizontal::Center),
            )
            .width(Length::Fill)
            .height(Length::Fixed(100.0))
            .center_x()
            .center_y()
            .style(theme::Container::Custom(Box::new(DropZoneContainer {
                accepting: self.drop_zone.is_acceptable(),
            }))),
        )
        .on_press(Message::BrowseFile);

        let scale_picker = pick_list(
            ScaleFactor::ALL.to_vec(),
            Some(self.session.scale()),
            Message::ScaleSelected,
        );

        let process_btn = if self.session.is_processing() {
            button(text("Processing...").font(HEADING_FONT).size(14))
                .padding([8, 10])
                .style(theme::Button::Secondary)
        } else {
            let btn = button(text("Upscale Image").font(HEADING_FONT).size(14))
                .padding([8, 10])
                .style(theme::Button::Primary);
            if self.session.can_process() {
                btn.on_press(Message::Process)
            } else {
                btn
            }
        };

        let save_btn = {
            let btn = button(text("Save Result").font(HEADING_FONT).size(14))
                .padding([8, 10])
                .style(theme::Button::Positive);
            if self.session.can_save() {
                btn.on_press(Message::Save)
            } else {
                btn
            }
        };

        let mut settings_content = column![
            section_title("Input"),
            Space::with_height(8),
            drop_zone,
            Space::with_height(12),
            row![
                text("Upscale Factor:").size(14).style(TEXT_SECONDARY),
                scale_picker,
                Space::with_width(Length::Fill),
                process_btn,
                save_btn,
            ]
            .spacing(10)
            .align_items(Alignment::Center),
        ]
        .spacing(0);

        if let Some(progress) = self.session.progress() {
            settings_content = settings_content
                .push(Space::with_height(12))
                .push(progress_bar(0.0..=100.0, progress as f32).height(Length::Fixed(8.0)));
        }

        settings_content = settings_content
            .push(Space::with_height(8))
            .push(text(&self.status_message).size(12).style(TEXT_SECONDARY));

        let settings_card = card_container(settings_content);

        let zoom_controls = row![
            button(text("-").size(18).horizontal_alignment(iced::alignment::Horizontal::Center))
                .on_press(Message::ZoomOut)
                .padding([4, 12])
                .style(theme::Button::Secondary),
            text(format!("{:.0}%", self.zoom_level * 100.0))
                .size(14)
                .style(TEXT_SECONDARY),
            button(text("+").size(18).horizontal_alignment(iced::alignment::Horizontal::Center))
                .on_press(Message::ZoomIn)
                .padding([4, 12])
                .style(theme::Button::Secondary),
            button(text("Reset").size(14))
                .on_press(Message::ResetZoom)
                .padding([4, 12])
                .style(theme::Button::Text),
        ]
        .spacing(8)
        .align_items(Alignment::Center);

        let preview_card = card_container(
            column![
                row![
                    section_title("Preview"),
                    Space::with_width(Length::Fill),
                    zoom_controls,
                ]
                .align_items(Alignment::Center),
                Space::with_height(16),
                row![
                    preview_column(
                        "Original Image",
                        self.before_image.as_ref(),
                        "No image loaded",
                        self.zoom_level
                    ),
                    Space::with_width(20),
                    preview_column(
                        "Upscaled Image",
                        self.after_image.as_ref(),
                        "Upscale to see the result",
                        self.zoom_level
                    ),
                ]
                .align_items(Alignment::Start),
            ]
            .spacing(0),
        );

        let content = scrollable(
            column![
                header,
                container(
                    column![settings_card, preview_card, Space::with_height(20)].spacing(16)
                )
                .width(Length::Fill)
                .center_x()
                .padding([6, 14, 6, 6])
            ]
            .spacing(0),
        );

        container(content)
            .width(Length::Fill)
            .height(Length::Fill)
            .style(theme::Container::Custom(Box::new(BackgroundContainer)))
            .into()
    }

    fn theme(&self) -> Theme {
        Theme::Light
    }
}

impl App {
    fn load_input(&mut self, path: PathBuf) -> Command<Message> {
        if let Err(e) = self.session.select_input(&path) {
            warn!("Rejected input {}: {}", path.display(), e);
            self.status_message = e.to_string();
            return Command::none();
        }

        info!("Loaded input {}", path.display());
        self.before_image = None;
        self.after_image = None;
        self.zoom_level = 1.0;
        self.status_message = format!(
            "Loaded: {}",
            self.session.input().map(|i| i.file_name()).unwrap_or_default()
        );

        Command::perform(load_preview(path), |r| Message::PreviewLoaded(Side::Before, r))
    }

    fn job_failed(&mut self, message: String) -> Command<Message> {
        error!("{}", message);
        self.job = None;
        self.session.apply(JobEvent::Failed(message.clone()));
        self.status_message = "Upscaling failed".to_string();
        show_dialog(MessageLevel::Error, "Error", message)
    }
}

async fn load_preview(path: PathBuf) -> Result<Preview, String> {
    tokio::task::spawn_blocking(move || {
        let img = image::open(&path).map_err(|e| e.to_string())?;
        let (width, height) = img.dimensions();
        let handle = iced_image::Handle::from_pixels(width, height, img.into_rgba8().into_raw());
        Ok(Preview {
            path,
            handle,
            width,
            height,
        })
    })
    .await
    .map_err(|e| format!("Task join error: {}", e))?
}

fn show_dialog(level: MessageLevel, title: &'static str, description: String) -> Command<Message> {
    Command::perform(
        async move {
            AsyncMessageDialog::new()
                .set_level(level)
                .set_title(title)
                .set_description(description)
                .set_buttons(MessageButtons::Ok)
                .show()
                .await;
        },
        |_| Message::DialogClosed,
    )
}

fn preview_column<'a>(
    title: &'a str,
    preview: Option<&'a Preview>,
    placeholder: &'a str,
    zoom: f32,
) -> Element<'a, Message> {
    let Some(preview) = preview else {
        return column![
            text(title).size(16).font(HEADING_FONT).style(TEXT_COLOR),
            Space::with_height(8),
            container(text(placeholder).style(TEXT_SECONDARY))
                .width(Length::Fill)
                .height(Length::Fixed(400.0))
                .center_x()
                .center_y()
        ]
        .spacing(0)
        .align_items(Alignment::Center)
        .width(Length::FillPortion(1))
        .into();
    };

    let display_w = preview.width as f32 * zoom;
    let display_h = preview.height as f32 * zoom;

    let image_view = scrollable(
        container(
            iced_image::Image::new(preview.handle.clone())
                .width(Length::Fixed(display_w))
                .height(Length::Fixed(display_h)),
        )
        .center_x()
        .center_y(),
    )
    .direction(Direction::Both {
        vertical: Properties::default(),
        horizontal: Properties::default(),
    })
    .width(Length::FillPortion(1))
    .height(Length::Fixed(400.0));

    column![
        text(title).size(16).font(HEADING_FONT).style(TEXT_COLOR),
        Space::with_height(8),
        image_view,
        Space::with_height(8),
        text(format!("{}×{}", preview.width, preview.height))
            .size(12)
            .style(TEXT_SECONDARY)
    ]
    .spacing(0)
    .align_items(Alignment::Center)
    .width(Length::FillPortion(1))
    .into()
}

fn section_title(title: &str) -> Element<'static, Message> {
    text(title)
        .size(14)
        .font(HEADING_FONT)
        .style(TEXT_COLOR)
        .into()
}

fn card_container<'a>(content: impl Into<Element<'a, Message>>) -> Element<'a, Message> {
    container(content)
        .width(Length::Fill)
        .padding(14)
        .style(theme::Container::Custom(Box::new(CardContainer)))
        .into()
}

struct BackgroundContainer;
impl container::StyleSheet for BackgroundContainer {
    type Style = Theme;

    fn appearance(&self, _style: &Self::Style) -> container::Appearance {
        container::Appearance {
            background: Some(Background::Color(BACKGROUND_COLOR)),
            ..Default::default()
        }
    }
}

struct CardContainer;
impl container::StyleSheet for CardContainer {
    type Style = Theme;

    fn appearance(&self, _style: &Self::Style) -> container::Appearance {
        container::Appearance {
            background: Some(Background::Color(CARD_COLOR)),
            border: iced::Border {
                color: Color::from_rgba(0.0, 0.0, 0.0, 0.08),
                width: 1.0,
                radius: 12.0.into(),
            },
            ..Default::default()
        }
    }
}

struct GradientContainer;
impl container::StyleSheet for GradientContainer {
    type Style = Theme;

    fn appearance(&self, _style: &Self::Style) -> container::Appearance {
        container::Appearance {
            background: Some(Background::Color(PRIMARY_COLOR)),
            ..Default::default()
        }
    }
}

/// Turns green while a single supported image hovers over the window.
struct DropZoneContainer {
    accepting: bool,
}

impl container::StyleSheet for DropZoneContainer {
    type Style = Theme;

    fn appearance(&self, _style: &Self::Style) -> container::Appearance {
        let (fill, border) = if self.accepting {
            (DROP_ACCEPT, DROP_ACCEPT_BORDER)
        } else {
            (DROP_IDLE, DROP_IDLE_BORDER)
        };
        container::Appearance {
            text_color: Some(border),
            background: Some(Background::Color(fill)),
            border: iced::Border {
                color: border,
                width: 3.0,
                radius: 15.0.into(),
            },
            ..Default::default()
        }
    }
}
