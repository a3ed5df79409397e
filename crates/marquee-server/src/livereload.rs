//! WebSocket-based live reload.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Messages sent to browsers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum LiveReloadMessage {
    /// Connection established
    Hello,

    /// An output file changed
    Reload {
        /// Changed path, relative to the site root
        path: String,
        /// Stylesheets can be swapped without a full reload
        #[serde(rename = "liveCSS")]
        live_css: bool,
    },
}

impl LiveReloadMessage {
    /// Reload message for a changed output path.
    pub fn changed(path: impl Into<String>) -> Self {
        let path = path.into();
        let live_css = path.ends_with(".css");
        LiveReloadMessage::Reload { path, live_css }
    }
}

/// Hub for broadcasting reload messages to all connected browsers.
#[derive(Debug, Clone)]
pub struct LiveReloadHub {
    sender: broadcast::Sender<LiveReloadMessage>,
}

impl LiveReloadHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }

    /// Send a message to all connected browsers.
    pub fn send(&self, msg: LiveReloadMessage) {
        // No receivers is fine
        let _ = self.sender.send(msg);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LiveReloadMessage> {
        self.sender.subscribe()
    }

    /// Number of connected browsers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for LiveReloadHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Client-side live reload script.
pub fn livereload_client_script(ws_url: &str) -> String {
    format!(
        r#"
(function() {{
  'use strict';

  var ws = new WebSocket('{}');

  function refreshStyles(path) {{
    var links = document.querySelectorAll('link[rel="stylesheet"]');
    Array.prototype.forEach.call(links, function(link) {{
      var href = link.getAttribute('href').split('?')[0];
      if (path.indexOf(href.replace(/^\//, '')) !== -1) {{
        link.setAttribute('href', href + '?livereload=' + Date.now());
      }}
    }});
  }}

  ws.onmessage = function(event) {{
    var msg = JSON.parse(event.data);

    switch (msg.command) {{
      case 'hello':
        console.log('[livereload] Connected');
        break;

      case 'reload':
        if (msg.liveCSS) {{
          refreshStyles(msg.path);
        }} else {{
          location.reload();
        }}
        break;
    }}
  }};

  ws.onclose = function() {{
    console.log('[livereload] Disconnected');
  }};
}})();
"#,
        ws_url
    )
}
