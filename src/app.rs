use base64::{engine::general_purpose::STANDARD, Engine as _};
use color_eyre::{eyre::eyre, Result};
use serde_json::Map;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::api::types::{Annotation, NewAnnotation, NewSignature, NewStamp, Session};
use crate::api::{DocumentService, HttpDocumentService};
use crate::commands::{AnnotationAction, Command, SignatureAction, StampAction};
use crate::config::Config;
use crate::db::Catalog;
use crate::event::{Event, EventHandler};
use crate::format;
use crate::query::{QueryClient, QueryState};
use crate::views::{AnnotationsView, DocumentView, DocumentsView, SignaturesView, StampsView};

/// Signed-in application state shared by every command
pub struct App {
  client: QueryClient,
  service: Arc<dyn DocumentService>,
  catalog: Option<Arc<Catalog>>,
  user_id: String,
}

impl App {
  /// Establish a session and open the catalog.
  pub async fn new(config: Config) -> Result<Self> {
    let http = HttpDocumentService::new(&config.api)?;
    let session = establish_session(&config, &http).await?;
    info!(user = %session.user_id, "session established");

    let catalog = if config.catalog.enabled {
      match Catalog::open(config.catalog.path.as_deref()) {
        Ok(catalog) => Some(Arc::new(catalog)),
        Err(e) => {
          warn!(error = %e, "document catalog unavailable, continuing without it");
          None
        }
      }
    } else {
      None
    };

    let service: Arc<dyn DocumentService> = Arc::new(http.with_token(session.token));
    let client = QueryClient::new(config.cache.query_config());
    Ok(Self::with_service(client, service, catalog, session.user_id))
  }

  pub fn with_service(
    client: QueryClient,
    service: Arc<dyn DocumentService>,
    catalog: Option<Arc<Catalog>>,
    user_id: impl Into<String>,
  ) -> Self {
    Self {
      client,
      service,
      catalog,
      user_id: user_id.into(),
    }
  }

  /// Exchange DOCDESK_PASSWORD for a token, printed for use as DOCDESK_TOKEN.
  pub async fn login(config: &Config) -> Result<String> {
    let http = HttpDocumentService::new(&config.api)?;
    let password = Config::get_password()?;
    let session = http
      .login(&config.api.email, &password)
      .await
      .map_err(|e| eyre!("Login failed: {}", e))?;
    Ok(format!(
      "Signed in as {}\nexport DOCDESK_TOKEN={}",
      session.user_id, session.token
    ))
  }

  pub async fn run(&self, command: Command) -> Result<()> {
    match command {
      Command::Watch { document, interval } => {
        self.watch(document, Duration::from_secs(interval.max(1))).await
      }
      command => {
        let output = self.execute(command).await?;
        println!("{}", output);
        Ok(())
      }
    }
  }

  /// Run a one-shot command and render its output.
  pub async fn execute(&self, command: Command) -> Result<String> {
    debug!(?command, "executing");
    match command {
      Command::Login => Err(eyre!("login does not need an existing session")),
      Command::Documents { search } => {
        let mut view = DocumentsView::new(
          &self.client,
          self.service.clone(),
          self.catalog.clone(),
          search,
        );
        let state = view.settled().await;
        let documents = loaded(state, "list documents")?;
        Ok(render_list(documents.as_slice(), "No documents", format::document_line))
      }
      Command::Document { id } => {
        let mut view = DocumentView::new(
          &self.client,
          self.service.clone(),
          self.catalog.clone(),
          id.as_str(),
        );
        let document = loaded(view.settled().await, "load document")?;
        match document.as_ref() {
          Some(document) => Ok(format::document_detail(document)),
          None => Err(eyre!("Document {} not found", id)),
        }
      }
      Command::Annotations { action } => self.annotations(action).await,
      Command::Signatures { action } => self.signatures(action).await,
      Command::Stamps { action } => self.stamps(action).await,
      Command::Watch { .. } => Err(eyre!("watch runs until interrupted, use run()")),
    }
  }

  async fn annotations(&self, action: AnnotationAction) -> Result<String> {
    let document = match &action {
      AnnotationAction::List { document }
      | AnnotationAction::Add { document, .. }
      | AnnotationAction::Delete { document, .. } => document.clone(),
    };
    let mut view = AnnotationsView::new(&self.client, self.service.clone(), document.as_str());

    let message = match action {
      AnnotationAction::List { .. } => None,
      AnnotationAction::Add {
        text, page, kind, ..
      } => {
        let created = view
          .add(NewAnnotation {
            document_id: document,
            kind,
            page,
            text: Some(text),
            extra: Map::new(),
          })
          .await
          .map_err(|e| eyre!("Failed to add annotation: {}", e))?;
        Some(format!("Added annotation {}", created.id))
      }
      AnnotationAction::Delete { id, .. } => {
        view
          .delete(&id)
          .await
          .map_err(|e| eyre!("Failed to delete annotation {}: {}", id, e))?;
        Some(format!("Deleted annotation {}", id))
      }
    };

    // After a write this waits for the refetch the write triggered
    let annotations = loaded(view.settled().await, "list annotations")?;
    let list = render_list(annotations.as_slice(), "No annotations", format::annotation_line);
    Ok(with_message(message, list))
  }

  async fn signatures(&self, action: SignatureAction) -> Result<String> {
    let mut view = SignaturesView::new(&self.client, self.service.clone(), self.user_id.as_str());
    let message = match action {
      SignatureAction::List => None,
      SignatureAction::Add { image } => {
        let data_url = image_data_url(&image)?;
        let saved = view
          .add(NewSignature { data_url })
          .await
          .map_err(|e| eyre!("Failed to save signature: {}", e))?;
        Some(format!("Saved signature {}", saved.id))
      }
      SignatureAction::Delete { id } => {
        view
          .delete(&id)
          .await
          .map_err(|e| eyre!("Failed to delete signature {}: {}", id, e))?;
        Some(format!("Deleted signature {}", id))
      }
    };

    let signatures = loaded(view.settled().await, "list signatures")?;
    let list = render_list(signatures.as_slice(), "No saved signatures", format::signature_line);
    Ok(with_message(message, list))
  }

  async fn stamps(&self, action: StampAction) -> Result<String> {
    let mut view = StampsView::new(&self.client, self.service.clone(), self.user_id.as_str());
    let message = match action {
      StampAction::List => None,
      StampAction::Add {
        stamp_type,
        preview,
      } => {
        let preview = image_data_url(&preview)?;
        let saved = view
          .add(NewStamp {
            stamp_type,
            preview,
          })
          .await
          .map_err(|e| eyre!("Failed to save stamp: {}", e))?;
        Some(format!("Saved stamp {}", saved.id))
      }
      StampAction::Delete { id } => {
        view
          .delete(&id)
          .await
          .map_err(|e| eyre!("Failed to delete stamp {}: {}", id, e))?;
        Some(format!("Deleted stamp {}", id))
      }
    };

    let stamps = loaded(view.settled().await, "list stamps")?;
    let list = render_list(stamps.as_slice(), "No saved stamps", format::stamp_line);
    Ok(with_message(message, list))
  }

  /// Poll a document's annotations, printing the list whenever it changes.
  async fn watch(&self, document: String, interval: Duration) -> Result<()> {
    let mut view = AnnotationsView::new(&self.client, self.service.clone(), document.as_str());
    let mut events = EventHandler::new(interval);
    let mut shown: Option<Arc<Vec<Annotation>>> = None;
    let mut last_error: Option<String> = None;

    info!(%document, ?interval, "watching annotations");
    if view.is_loading() {
      println!("Loading annotations for {}...", document);
    }
    loop {
      if !view.is_loading() && !view.is_fetching() {
        match view.error() {
          Some(error) => {
            let message = error.to_string();
            if last_error.as_ref() != Some(&message) {
              eprintln!("Failed to refresh annotations: {}", message);
              last_error = Some(message);
            }
          }
          None => {
            last_error = None;
            let data = view.data();
            if shown.as_ref() != Some(&data) {
              println!(
                "{}\n",
                render_list(data.as_slice(), "No annotations", format::annotation_line)
              );
              shown = Some(data);
            }
          }
        }
      }

      tokio::select! {
        alive = view.changed() => {
          if !alive {
            break;
          }
        }
        event = events.next() => match event {
          Some(Event::Tick) => {
            view.refetch();
          }
          Some(Event::Interrupt) | None => break,
        },
      }
    }

    debug!("watch stopped");
    Ok(())
  }
}

async fn establish_session(config: &Config, http: &HttpDocumentService) -> Result<Session> {
  if let Some(token) = Config::get_api_token() {
    debug!("using token from DOCDESK_TOKEN");
    return Ok(Session {
      token,
      user_id: config.api.email.clone(),
    });
  }

  let password = Config::get_password()?;
  http
    .login(&config.api.email, &password)
    .await
    .map_err(|e| eyre!("Login failed: {}", e))
}

/// Turn a settled state into its value, or the reason it has none.
fn loaded<T>(state: QueryState<T>, what: &str) -> Result<Arc<T>>
where
  T: Default,
{
  if let Some(error) = state.error {
    return Err(eyre!("Failed to {}: {}", what, error));
  }
  Ok(state.data.unwrap_or_default())
}

fn render_list<T>(items: &[T], empty: &str, line: fn(&T) -> String) -> String {
  if items.is_empty() {
    return empty.to_string();
  }
  items.iter().map(line).collect::<Vec<_>>().join("\n")
}

fn with_message(message: Option<String>, body: String) -> String {
  match message {
    Some(message) => format!("{}\n\n{}", message, body),
    None => body,
  }
}

/// Read an image file into a `data:image/...;base64,` URL.
pub fn image_data_url(path: &Path) -> Result<String> {
  let extension = path
    .extension()
    .and_then(|e| e.to_str())
    .map(str::to_ascii_lowercase)
    .unwrap_or_default();
  let mime = match extension.as_str() {
    "png" => "image/png",
    "jpg" | "jpeg" => "image/jpeg",
    "gif" => "image/gif",
    "webp" => "image/webp",
    "svg" => "image/svg+xml",
    _ => return Err(eyre!("Unsupported image type: {}", path.display())),
  };

  let bytes = std::fs::read(path)
    .map_err(|e| eyre!("Failed to read image {}: {}", path.display(), e))?;
  if bytes.is_empty() {
    return Err(eyre!("Image {} is empty", path.display()));
  }
  Ok(format!("data:{};base64,{}", mime, STANDARD.encode(bytes)))
}
