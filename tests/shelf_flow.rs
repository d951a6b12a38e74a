use image::{Rgb, RgbImage};
use pdf_shelf::persistence::{JsonFileStore, Settings};
use pdf_shelf::state::ThumbnailState;
use pdf_shelf::thumbnail_cache::{cache_key, ThumbnailCache};
use pdf_shelf::{AppConfig, RasterError, Rasterizer, ShelfEvent, ShelfService};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Renders a white page; files named `broken*` fail.
#[derive(Default)]
struct WhitePages {
    renders: AtomicUsize,
}

impl Rasterizer for WhitePages {
    fn page_count(&self, _path: &Path) -> Result<usize, RasterError> {
        Ok(1)
    }

    fn rasterize_first_page(&self, path: &Path, zoom: f32) -> Result<RgbImage, RasterError> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(5));
        let broken = path
            .file_name()
            .is_some_and(|name| name.to_string_lossy().starts_with("broken"));
        if broken {
            return Err(RasterError::Open {
                path: path.to_path_buf(),
                message: "not a PDF".to_string(),
            });
        }
        let width = (612.0 * zoom / 4.0) as u32;
        Ok(RgbImage::from_pixel(width, width * 11 / 8, Rgb([250, 250, 250])))
    }
}

struct Env {
    root: tempfile::TempDir,
    rasterizer: Arc<WhitePages>,
}

impl Env {
    fn new(pdfs: &[&str]) -> Self {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("docs")).unwrap();
        for name in pdfs {
            fs::write(root.path().join("docs").join(name), b"%PDF-1.7").unwrap();
        }
        Self {
            root,
            rasterizer: Arc::new(WhitePages::default()),
        }
    }

    fn docs(&self) -> PathBuf {
        self.root.path().join("docs")
    }

    fn config(&self) -> AppConfig {
        AppConfig::new(
            self.root.path().join("cache"),
            self.root.path().join("config").join("settings.json"),
        )
        .with_max_workers(2)
    }

    fn shelf(&self) -> ShelfService {
        let config = self.config();
        let settings = Settings::new(JsonFileStore::open(&config.settings_path));
        ShelfService::new(&config, self.rasterizer.clone(), settings).unwrap()
    }
}

fn settle(shelf: &mut ShelfService) -> Vec<ShelfEvent> {
    let mut events = Vec::new();
    for _ in 0..400 {
        events.extend(shelf.wait(Duration::from_millis(25)));
        if shelf.progress().is_complete() {
            break;
        }
    }
    events
}

#[test]
fn first_open_renders_then_reopen_hits_the_cache() {
    let env = Env::new(&["Zeta.pdf", "alpha.pdf", "broken.pdf"]);
    let mut shelf = env.shelf();

    shelf.open_folder(&env.docs());
    let events = settle(&mut shelf);
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, ShelfEvent::BatchComplete { .. }))
            .count(),
        1
    );
    assert_eq!(env.rasterizer.renders.load(Ordering::SeqCst), 3);

    let cards = shelf.cards();
    let names: Vec<_> = cards.iter().map(|c| c.document.name()).collect();
    assert_eq!(names, vec!["alpha.pdf", "broken.pdf", "Zeta.pdf"]);

    let cache_dir = env.root.path().join("cache");
    let alpha = env.docs().join("alpha.pdf");
    let expected = cache_dir.join(format!("{}.png", cache_key(&alpha)));
    assert_eq!(
        cards[0].thumbnail,
        ThumbnailState::Displayed {
            image: expected.clone(),
            placeholder: false,
        }
    );
    let thumb = image::open(&expected).unwrap();
    assert!(thumb.width() <= 150 && thumb.height() <= 200);

    match &cards[1].thumbnail {
        ThumbnailState::Displayed { image, placeholder } => {
            assert!(placeholder);
            assert_eq!(image, &cache_dir.join("default.png"));
        }
        other => panic!("unexpected {:?}", other),
    }

    // A new session over the same cache renders only the failed document.
    drop(shelf);
    let mut again = env.shelf();
    again.open_folder(&env.docs());
    settle(&mut again);
    assert_eq!(env.rasterizer.renders.load(Ordering::SeqCst), 4);
}

#[test]
fn narrowing_the_search_supersedes_the_running_batch() {
    let names: Vec<String> = (0..30).map(|i| format!("doc{:02}.pdf", i)).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let env = Env::new(&refs);
    let mut shelf = env.shelf();

    shelf.open_folder(&env.docs());
    let first_epoch = shelf.view().epoch();
    shelf.set_search_text("DOC2");
    let second_epoch = shelf.view().epoch();
    assert!(second_epoch > first_epoch);

    let events = settle(&mut shelf);
    for event in &events {
        match event {
            ShelfEvent::ThumbnailReady { document, .. }
            | ShelfEvent::ThumbnailFailed { document, .. } => {
                let name = document.file_name().unwrap().to_string_lossy();
                assert!(name.starts_with("doc2"), "stale result for {}", name);
            }
            ShelfEvent::BatchComplete { epoch } => assert_eq!(*epoch, second_epoch),
            ShelfEvent::Progress(progress) => assert_eq!(progress.total, 10),
            _ => {}
        }
    }
    assert_eq!(shelf.cards().len(), 10);
    assert!(shelf
        .cards()
        .iter()
        .all(|card| matches!(card.thumbnail, ThumbnailState::Displayed { .. })));
}

#[test]
fn favorites_and_last_folder_survive_restart() {
    let env = Env::new(&["a.pdf", "b.pdf"]);
    let b = env.docs().join("b.pdf");

    {
        let mut shelf = env.shelf();
        shelf.open_folder(&env.docs());
        shelf.actions().toggle_favorite(&b);
        let events = shelf.pump();
        assert!(events.contains(&ShelfEvent::FavoriteChanged {
            document: b.clone(),
            favorite: true,
        }));
        settle(&mut shelf);
    }

    let mut shelf = env.shelf();
    assert!(shelf.view().is_favorite(&b));
    shelf.set_favorites_mode(true);
    shelf.restore_last_folder();
    settle(&mut shelf);

    let cards = shelf.cards();
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0].document.path(), b.as_path());
    assert!(cards[0].favorite);
}

#[test]
fn unwritable_cache_still_shows_thumbnails() {
    let env = Env::new(&["a.pdf"]);
    let blocker = env.root.path().join("blocker");
    fs::write(&blocker, b"file, not a directory").unwrap();

    let cache = Arc::new(ThumbnailCache::open(blocker.join("cache")));
    assert!(!cache.is_persistent());

    let config = env.config();
    let mut shelf =
        ShelfService::with_cache(&config, cache, env.rasterizer.clone(), Settings::in_memory())
            .unwrap();
    shelf.open_folder(&env.docs());
    settle(&mut shelf);

    let card = &shelf.cards()[0];
    let ThumbnailState::Displayed { image, placeholder } = &card.thumbnail else {
        panic!("thumbnail not resolved");
    };
    assert!(!placeholder);
    assert!(image.exists());
    let pixels = shelf.card_image(card.document.path()).unwrap();
    assert!(pixels.width <= 150 && pixels.height <= 200);
}

#[test]
fn missing_folder_is_reported_not_fatal() {
    let env = Env::new(&["a.pdf"]);
    let mut shelf = env.shelf();

    shelf.open_folder(&env.docs());
    let events = shelf.open_folder(&env.root.path().join("nope"));
    assert!(matches!(events.as_slice(), [ShelfEvent::Notification(_)]));
    assert_eq!(shelf.view().folder(), Some(env.docs().as_path()));
    assert_eq!(shelf.cards().len(), 1);
}
