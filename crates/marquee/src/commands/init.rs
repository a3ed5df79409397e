//! Scaffold a new site.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Files written by `init`, relative to the project root.
const SCAFFOLD: &[(&str, &str)] = &[
    ("site.toml", DEFAULT_CONFIG),
    ("src/content/authors.json", DEFAULT_AUTHORS),
    ("src/content/talks.json", DEFAULT_TALKS),
    ("src/content/jobs.json", DEFAULT_JOBS),
    ("src/layout.jinja", DEFAULT_LAYOUT),
    ("src/index.jinja", DEFAULT_INDEX),
    ("src/open-source.jinja", DEFAULT_OPEN_SOURCE),
    ("src/events-&-talks.jinja", DEFAULT_EVENTS),
    ("src/join-the-team.jinja", DEFAULT_JOIN),
    ("src/css/main.css", DEFAULT_STYLES),
    ("src/js/app.js", DEFAULT_SCRIPT),
];

/// Run the init command in `root`.
pub async fn run(root: &Path, yes: bool) -> Result<()> {
    tracing::info!("Initializing marquee...");

    let source_dir = root.join("src");
    if source_dir.exists() && !yes {
        tracing::warn!("src/ directory already exists. Use --yes to overwrite.");
        return Ok(());
    }

    for (relative, contents) in SCAFFOLD {
        let path = root.join(relative);
        if path.exists() && !yes {
            continue;
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("Failed to write {}", relative))?;
        tracing::info!("Created {}", relative);
    }

    tracing::info!("Initialization complete!");
    tracing::info!("Run 'marquee watch' to start working on the site.");

    Ok(())
}

const DEFAULT_CONFIG: &str = r#"# marquee configuration

[site]
# Directory holding templates, content and assets
source = "src"

# Output directory for the built site
output = "target"

[styles]
entry = "css/main.css"
minify = true

[styles.targets]
safari = 7

[scripts]
entry = "js/app.js"
output = "js/bundle.js"

# Upcoming events are fetched per author handle when a URL is set
[events]
# url = "https://events.example.com/people/{handle}/upcoming.json"
timeout_secs = 10

[server]
port = 35729
"#;

const DEFAULT_AUTHORS: &str = r#"[
  {
    "name": "Ada Lovelace",
    "email": "ada@example.com",
    "handle": "ada",
    "twitter": "ada"
  },
  {
    "name": "Charles Babbage",
    "email": "charles@example.com"
  }
]
"#;

const DEFAULT_TALKS: &str = r#"[
  {
    "title": "Shipping a newsroom on static files",
    "author": "Ada Lovelace",
    "date": "2024-05-14",
    "url": "https://example.com/talks/static-newsroom"
  }
]
"#;

const DEFAULT_JOBS: &str = r#"[
  {
    "title": "Senior Frontend Engineer",
    "url": "https://example.com/jobs/frontend"
  }
]
"#;

const DEFAULT_LAYOUT: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>{{ title }}</title>
  {% if description %}<meta name="description" content="{{ description }}">{% endif %}
  <link rel="stylesheet" href="css/main.css">
</head>
<body>
  <nav>
    <ul>
    {% for p in pages %}
      <li{% if p.title == title %} class="active"{% endif %}><a href="{{ p.output_basename }}">{{ p.menu_title or p.title }}</a></li>
    {% endfor %}
    </ul>
  </nav>
  <main>
    {% block content %}{% endblock %}
  </main>
  <script src="js/bundle.js"></script>
  {% if livereload %}<script src="/livereload.js" async></script>{% endif %}
</body>
</html>
"#;

const DEFAULT_INDEX: &str = r#"{% extends "layout.jinja" %}
{% block content %}
<h1>{{ title }}</h1>
<p>{{ description }}</p>
{% if jobs %}
<h2>We're hiring</h2>
<ul>
  {% for job in jobs %}<li><a href="{{ job.url }}">{{ job.title }}</a></li>{% endfor %}
</ul>
{% endif %}
{% endblock %}
"#;

const DEFAULT_OPEN_SOURCE: &str = r#"{% extends "layout.jinja" %}
{% block content %}
<h1>{{ title }}</h1>
<p>Projects we maintain in the open.</p>
{% endblock %}
"#;

const DEFAULT_EVENTS: &str = r#"{% extends "layout.jinja" %}
{% block content %}
<h1>{{ title }}</h1>
{% for activity, events in upcoming_events | items %}
<section class="events events--{{ activity }}">
  <h2>{{ activity | capitalize }}</h2>
  <ul>
  {% for event in events %}
    <li>
      <strong>{{ event.title }}</strong>
      <time datetime="{{ event.date }}">{{ event.date | format_date("%B %Y") }}</time>
      {% for user in event.users %}<img src="{{ avatar_url(user.email) }}" alt="{{ user.name }}">{% endfor %}
    </li>
  {% endfor %}
  </ul>
</section>
{% endfor %}
<h2>Talks</h2>
<ul>
{% for talk in talks %}
  {% set speaker = find_author_by_name(talk.author) %}
  <li>
    <a href="{{ talk.url }}">{{ talk.title }}</a>
    <img src="{{ avatar_url(speaker.email) }}" alt=""> {{ speaker.name }},
    {{ talk.date | format_date("%d %B %Y") }}
  </li>
{% endfor %}
</ul>
{% endblock %}
"#;

const DEFAULT_JOIN: &str = r#"{% extends "layout.jinja" %}
{% block content %}
<h1>{{ title }}</h1>
<p>{{ description }}</p>
<ul>
  {% for job in jobs %}<li><a href="{{ job.url }}">{{ job.title }}</a></li>{% else %}<li>No openings right now.</li>{% endfor %}
</ul>
{% endblock %}
"#;

const DEFAULT_STYLES: &str = r#"body {
  font-family: Georgia, serif;
  margin: 0;

  & nav ul {
    display: flex;
    list-style: none;
  }
}

.events img {
  border-radius: 50%;
  width: 32px;
}
"#;

const DEFAULT_SCRIPT: &str = r#"document.documentElement.className += ' js';
"#;
