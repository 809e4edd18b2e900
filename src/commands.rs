//! Command-line surface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "docdesk")]
#[command(about = "Browse, annotate and sign documents from the terminal")]
#[command(version)]
pub struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/docdesk/config.yaml)
  #[arg(short, long, global = true)]
  pub config: Option<PathBuf>,

  /// Debug logging (overridden by DOCDESK_LOG)
  #[arg(short, long, global = true)]
  pub verbose: bool,

  #[command(subcommand)]
  pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
  /// Sign in with DOCDESK_PASSWORD and print a token
  Login,

  /// List documents
  #[command(visible_alias = "docs")]
  Documents {
    /// Only documents whose name matches
    #[arg(short, long, default_value = "")]
    search: String,
  },

  /// Show one document
  #[command(visible_alias = "doc")]
  Document { id: String },

  /// Annotations on a document
  #[command(visible_alias = "a")]
  Annotations {
    #[command(subcommand)]
    action: AnnotationAction,
  },

  /// Saved signatures
  #[command(visible_alias = "sig")]
  Signatures {
    #[command(subcommand)]
    action: SignatureAction,
  },

  /// Saved stamps
  Stamps {
    #[command(subcommand)]
    action: StampAction,
  },

  /// Print a document's annotations and reprint them whenever they change
  Watch {
    document: String,
    /// Seconds between polls
    #[arg(short, long, default_value_t = 30)]
    interval: u64,
  },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum AnnotationAction {
  #[command(visible_alias = "ls")]
  List { document: String },
  Add {
    document: String,
    text: String,
    /// Page number, starting at 1
    #[arg(short, long)]
    page: Option<u32>,
    #[arg(short, long, default_value = "note")]
    kind: String,
  },
  #[command(visible_alias = "rm")]
  Delete { document: String, id: String },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum SignatureAction {
  #[command(visible_alias = "ls")]
  List,
  /// Save an image file as a signature
  Add { image: PathBuf },
  #[command(visible_alias = "rm")]
  Delete { id: String },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum StampAction {
  #[command(visible_alias = "ls")]
  List,
  /// Save an image file as a stamp of the given type
  Add {
    #[arg(value_name = "TYPE")]
    stamp_type: String,
    preview: PathBuf,
  },
  #[command(visible_alias = "rm")]
  Delete { id: String },
}
