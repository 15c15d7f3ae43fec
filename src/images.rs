use std::collections::{HashMap, HashSet};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use eframe::egui::{self, ColorImage, TextureHandle, TextureOptions};
use reqwest::blocking::Client;

use crate::renderer::decode_color_image;

pub const CARD_THUMB_MAX_DIM: usize = 384;
pub const DETAIL_IMAGE_MAX_DIM: usize = 1600;
const MAX_CACHED_TEXTURES: usize = 160;
const MAX_CONCURRENT_DOWNLOADS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageSize {
    Thumb,
    Full,
}

impl ImageSize {
    fn max_dim(self) -> usize {
        match self {
            ImageSize::Thumb => CARD_THUMB_MAX_DIM,
            ImageSize::Full => DETAIL_IMAGE_MAX_DIM,
        }
    }
}

type ImageKey = (String, ImageSize);

enum ImageSlot {
    Ready(TextureHandle),
    Failed,
}

struct CachedImage {
    slot: ImageSlot,
    last_used: u64,
}

pub enum ImageState {
    Ready(TextureHandle),
    Loading,
    Failed,
}

/// Downloads specimen photos on background threads and keeps the decoded
/// textures keyed by URL and size.
pub struct ImageCache {
    client: Option<Client>,
    slots: HashMap<ImageKey, CachedImage>,
    use_clock: u64,
    queued: Vec<ImageKey>,
    in_flight: HashSet<ImageKey>,
    tx: Sender<(ImageKey, Result<ColorImage, String>)>,
    rx: Receiver<(ImageKey, Result<ColorImage, String>)>,
    texture_nonce: u64,
}

impl Default for ImageCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageCache {
    pub fn new() -> Self {
        let client = match build_image_client() {
            Ok(client) => Some(client),
            Err(err) => {
                log::warn!("Image downloads disabled: {err:#}");
                None
            }
        };
        let (tx, rx) = mpsc::channel();
        Self {
            client,
            slots: HashMap::new(),
            use_clock: 0,
            queued: Vec::new(),
            in_flight: HashSet::new(),
            tx,
            rx,
            texture_nonce: 0,
        }
    }

    pub fn is_loading(&self) -> bool {
        !self.in_flight.is_empty() || !self.queued.is_empty()
    }

    /// Returns the texture when ready, otherwise queues the download.
    pub fn get(&mut self, url: &str, size: ImageSize) -> ImageState {
        let key = (url.to_string(), size);
        if !self.slots.contains_key(&key)
            && !self.in_flight.contains(&key)
            && !self.queued.contains(&key)
        {
            self.queued.push(key.clone());
        }
        self.use_clock += 1;
        match self.slots.get_mut(&key) {
            Some(cached) => {
                cached.last_used = self.use_clock;
                match &cached.slot {
                    ImageSlot::Ready(texture) => ImageState::Ready(texture.clone()),
                    ImageSlot::Failed => ImageState::Failed,
                }
            }
            None => ImageState::Loading,
        }
    }

    pub fn poll(&mut self, ctx: &egui::Context) {
        loop {
            match self.rx.try_recv() {
                Ok((key, result)) => {
                    self.in_flight.remove(&key);
                    let slot = match result {
                        Ok(color_image) => {
                            self.texture_nonce = self.texture_nonce.wrapping_add(1);
                            let name = format!("specimen-image-{}", self.texture_nonce);
                            ImageSlot::Ready(ctx.load_texture(
                                name,
                                color_image,
                                TextureOptions::LINEAR,
                            ))
                        }
                        Err(err) => {
                            log::debug!("Image {} unavailable: {err}", key.0);
                            ImageSlot::Failed
                        }
                    };
                    self.insert(key, slot);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        self.evict_least_recent(MAX_CACHED_TEXTURES);
        self.start_queued();
        if self.is_loading() {
            ctx.request_repaint_after(Duration::from_millis(16));
        }
    }

    /// Forgets queued downloads that were not started, e.g. after a page
    /// change made them irrelevant.
    pub fn drop_queued(&mut self) {
        self.queued.clear();
    }

    fn insert(&mut self, key: ImageKey, slot: ImageSlot) {
        self.use_clock += 1;
        let last_used = self.use_clock;
        self.slots.insert(key, CachedImage { slot, last_used });
    }

    /// Keeps the `capacity` most recently requested entries. Failed URLs
    /// stay cached so they are not retried every frame.
    fn evict_least_recent(&mut self, capacity: usize) {
        if self.slots.len() <= capacity {
            return;
        }
        let mut by_age: Vec<(u64, ImageKey)> = self
            .slots
            .iter()
            .map(|(key, cached)| (cached.last_used, key.clone()))
            .collect();
        by_age.sort_unstable_by_key(|(last_used, _)| *last_used);
        let excess = self.slots.len() - capacity;
        log::debug!("Evicting {excess} cached specimen images");
        for (_, key) in by_age.into_iter().take(excess) {
            self.slots.remove(&key);
        }
    }

    fn start_queued(&mut self) {
        let Some(client) = self.client.as_ref() else {
            for key in std::mem::take(&mut self.queued) {
                self.insert(key, ImageSlot::Failed);
            }
            return;
        };

        while self.in_flight.len() < MAX_CONCURRENT_DOWNLOADS && !self.queued.is_empty() {
            let key = self.queued.remove(0);
            let client = client.clone();
            let tx = self.tx.clone();
            self.in_flight.insert(key.clone());
            thread::spawn(move || {
                let result = download_image(&client, &key.0, key.1.max_dim())
                    .map_err(|err| format!("{err:#}"));
                let _ = tx.send((key, result));
            });
        }
    }
}

fn build_image_client() -> Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(60))
        .build()
        .context("Could not initialize HTTP client for images")
}

fn download_image(client: &Client, url: &str, max_dim: usize) -> Result<ColorImage> {
    let response = client
        .get(url)
        .send()
        .with_context(|| format!("HTTP request failed for {url}"))?;
    let status = response.status();
    if !status.is_success() {
        bail!("HTTP {status} for {url}");
    }
    let bytes = response
        .bytes()
        .with_context(|| format!("Could not read response body from {url}"))?;
    decode_color_image(&bytes, Some(max_dim))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_image_is_queued_once() {
        let mut cache = ImageCache::new();
        assert!(!cache.is_loading());
        assert!(matches!(
            cache.get("https://images.example/a.jpg", ImageSize::Thumb),
            ImageState::Loading
        ));
        cache.get("https://images.example/a.jpg", ImageSize::Thumb);
        cache.get("https://images.example/a.jpg", ImageSize::Full);
        assert_eq!(cache.queued.len(), 2);
        assert!(cache.is_loading());

        cache.drop_queued();
        assert!(!cache.is_loading());
    }

    #[test]
    fn decoded_images_become_textures_on_poll() {
        let ctx = egui::Context::default();
        let mut cache = ImageCache::new();
        let key = ("https://images.example/b.jpg".to_string(), ImageSize::Thumb);
        let pixel = ColorImage::new([2, 2], egui::Color32::WHITE);
        cache
            .tx
            .send((key.clone(), Ok(pixel)))
            .expect("channel open");
        cache
            .tx
            .send((("bad".to_string(), ImageSize::Thumb), Err("404".to_string())))
            .expect("channel open");
        cache.poll(&ctx);

        assert!(matches!(cache.get(&key.0, key.1), ImageState::Ready(_)));
        assert!(matches!(cache.get("bad", ImageSize::Thumb), ImageState::Failed));
        assert!(!cache.is_loading());
    }

    #[test]
    fn eviction_keeps_recently_requested_images() {
        let ctx = egui::Context::default();
        let mut cache = ImageCache::new();
        let url = |index: usize| format!("https://images.example/{index}.jpg");
        for index in 0..4 {
            let pixel = ColorImage::new([1, 1], egui::Color32::WHITE);
            cache
                .tx
                .send(((url(index), ImageSize::Thumb), Ok(pixel)))
                .expect("channel open");
        }
        cache
            .tx
            .send(((url(9), ImageSize::Thumb), Err("404".to_string())))
            .expect("channel open");
        cache.poll(&ctx);

        cache.get(&url(0), ImageSize::Thumb);
        cache.get(&url(9), ImageSize::Thumb);
        cache.evict_least_recent(2);

        assert_eq!(cache.slots.len(), 2);
        assert!(matches!(cache.get(&url(0), ImageSize::Thumb), ImageState::Ready(_)));
        assert!(matches!(cache.get(&url(9), ImageSize::Thumb), ImageState::Failed));
        assert!(cache.queued.is_empty());
    }
}
