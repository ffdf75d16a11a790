//! Element normalization.
//!
//! Turns one candidate element into a [`Descriptor`]: captures and strips
//! the live activation attribute and inline background so the host does not
//! fetch them eagerly, binds an inert placeholder where media would otherwise
//! render empty, and reads the `data-*` conventions into typed fields.

use laze_config::STRATEGY_IMMEDIATE;
use laze_primitives::{DescriptorState, ElementTag, NodeId, Priority, ResourceKind};

use crate::descriptor::Descriptor;
use crate::host::{Binding, Dom};

const PLACEHOLDER_COLOR: &str = "data:image/gif;base64,R0lGODlhAQABAIAAAP///wAAACH5BAEAAAAALAAAAAABAAEAAAICRAEAOw==";
const PLACEHOLDER_BLUR: &str = "data:image/gif;base64,R0lGODlhAQABAIAAAAAAAP///yH5BAEAAAAALAAAAAABAAEAAAIBRAA7";

/// Result of looking at one candidate.
#[derive(Debug)]
pub enum Scanned {
	/// Detached, marked `data-lazy-skip`, or already loaded this session.
	Skip(SkipCause),
	Managed(Box<Descriptor>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipCause {
	Detached,
	OptedOut,
	SessionLoaded,
}

/// Classifies an element into a resource kind.
pub fn classify(dom: &dyn Dom, node: NodeId, tag: ElementTag) -> ResourceKind {
	match tag {
		ElementTag::Script => ResourceKind::Script,
		ElementTag::Link if dom.attr(node, "data-href").is_some() => ResourceKind::Stylesheet,
		ElementTag::Link if dom.attr(node, "data-font").is_some() => ResourceKind::Font,
		_ => ResourceKind::ImageLike,
	}
}

/// Extracts the URL from a CSS `url(...)` value.
pub fn css_url(value: &str) -> Option<&str> {
	let inner = value.trim().strip_prefix("url(")?.strip_suffix(')')?.trim();
	let inner = inner
		.strip_prefix('"')
		.and_then(|s| s.strip_suffix('"'))
		.or_else(|| inner.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))
		.unwrap_or(inner);
	(!inner.is_empty()).then_some(inner)
}

fn non_empty(value: Option<String>) -> Option<String> {
	value.filter(|v| !v.trim().is_empty())
}

/// Normalizes `node`.
///
/// `session_loaded` tells whether an id was recorded loaded earlier in the
/// session; `fresh_id` supplies an id for elements that lack `data-id`, and
/// the generated id is written back.
pub fn scan_element(
	dom: &mut dyn Dom,
	node: NodeId,
	session_loaded: impl Fn(&str) -> bool,
	fresh_id: impl FnOnce() -> String,
) -> Scanned {
	let Some(tag) = dom.tag(node) else {
		return Scanned::Skip(SkipCause::Detached);
	};
	if dom.attr(node, "data-lazy-skip").is_some() {
		return Scanned::Skip(SkipCause::OptedOut);
	}
	let declared_id = non_empty(dom.attr(node, "data-id"));
	if declared_id.as_deref().is_some_and(&session_loaded) {
		return Scanned::Skip(SkipCause::SessionLoaded);
	}

	let kind = classify(dom, node, tag);
	let binding = Binding::for_kind(kind, non_empty(dom.attr(node, "data-lazy-attr")));
	let attr = binding.attr().to_string();

	let mut deferred_value = binding.get(dom, node).or_else(|| non_empty(dom.attr(node, &format!("data-{attr}"))));
	if deferred_value.is_none() && kind == ResourceKind::Font {
		deferred_value = non_empty(dom.attr(node, "data-font"));
	}
	dom.remove_attr(node, &attr);

	let background_value = dom
		.style(node, "background-image")
		.as_deref()
		.and_then(css_url)
		.map(str::to_string)
		.or_else(|| non_empty(dom.attr(node, "data-bg")));
	if dom.style(node, "background-image").is_some() {
		let _ = dom.set_style(node, "background-image", "");
	}

	if tag.is_media() {
		if deferred_value.is_none() {
			let flavor = dom.attr(node, "data-placeholder");
			let (uri, marker) = match flavor.as_deref() {
				Some("color") => (PLACEHOLDER_COLOR, "color"),
				_ => (PLACEHOLDER_BLUR, "blur"),
			};
			if binding.set(dom, node, uri).is_ok() {
				let _ = dom.set_attr(node, "data-lazy-placeholder", marker);
			}
		}
		if let (Some(w), Some(h)) = (dom.attr(node, "data-width"), dom.attr(node, "data-height")) {
			let _ = dom.set_attr(node, "data-aspect-ratio", &format!("{w}/{h}"));
		}
	}
	let animated = tag.is_media() && dom.attr(node, "data-lazy-animation").is_some();
	if animated {
		let _ = dom.set_style(node, "animation-play-state", "paused");
	}

	let priority = match dom.attr(node, "data-priority") {
		Some(raw) => raw.parse::<Priority>().unwrap_or_else(|err| {
			tracing::debug!(%node, error = %err, "laze.priority_fallback");
			Priority::Low
		}),
		None => Priority::Low,
	};
	let size_estimate = dom.attr(node, "data-size").and_then(|s| s.trim().parse::<u64>().ok()).unwrap_or(0);

	let id = match declared_id {
		Some(id) => id,
		None => {
			let id = fresh_id();
			let _ = dom.set_attr(node, "data-id", &id);
			id
		}
	};
	let _ = dom.set_attr(node, "data-lazy-type", kind.as_str());

	Scanned::Managed(Box::new(Descriptor {
		node,
		id,
		tag,
		kind,
		priority,
		binding,
		deferred_value,
		background_value,
		size_estimate,
		group: non_empty(dom.attr(node, "data-lazy-group")),
		depends_on: non_empty(dom.attr(node, "data-depends-on")),
		strategy: non_empty(dom.attr(node, "data-lazy-strategy")).unwrap_or_else(|| STRATEGY_IMMEDIATE.to_string()),
		crossorigin: non_empty(dom.attr(node, "data-crossorigin")),
		animated,
		animation_class: non_empty(dom.attr(node, "data-lazy-animation-class")),
		observe_start: None,
		intersected: false,
		retry_count: 0,
		state: DescriptorState::Unregistered,
		timeout_timer: None,
	}))
}

/// Short base-36 id derived from a sequence number.
pub fn generated_id(seq: u64) -> String {
	// splitmix64 finalizer so consecutive ids do not look sequential
	let mut z = seq.wrapping_add(0x9E37_79B9_7F4A_7C15);
	z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
	z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
	z ^= z >> 31;

	const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
	let mut buf = Vec::with_capacity(13);
	loop {
		buf.push(DIGITS[(z % 36) as usize]);
		z /= 36;
		if z == 0 {
			break;
		}
	}
	buf.reverse();
	format!("lazy-{}", String::from_utf8_lossy(&buf))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::host::memory::MemoryDom;

	fn managed(s: Scanned) -> Descriptor {
		match s {
			Scanned::Managed(d) => *d,
			Scanned::Skip(cause) => panic!("unexpected skip: {cause:?}"),
		}
	}

	#[test]
	fn captures_and_strips_live_attribute() {
		let mut dom = MemoryDom::new();
		let node = dom.insert(ElementTag::Img, &[("src", "/hero.png"), ("data-id", "hero"), ("data-priority", "high"), ("data-size", "2048")]);
		let d = managed(scan_element(&mut dom, node, |_| false, || unreachable!()));

		assert_eq!(d.deferred_value.as_deref(), Some("/hero.png"));
		assert_eq!(d.priority, Priority::High);
		assert_eq!(d.size_estimate, 2048);
		assert_eq!(dom.get_attr(node, "src"), None);
		assert_eq!(dom.get_attr(node, "data-lazy-type").as_deref(), Some("default"));
	}

	#[test]
	fn media_without_value_gets_placeholder_and_generated_id() {
		let mut dom = MemoryDom::new();
		let node = dom.insert(ElementTag::Video, &[("data-placeholder", "color"), ("data-width", "16"), ("data-height", "9")]);
		let d = managed(scan_element(&mut dom, node, |_| false, || "lazy-abc".to_string()));

		assert_eq!(d.id, "lazy-abc");
		assert!(d.deferred_value.is_none());
		assert_eq!(dom.get_attr(node, "src").as_deref(), Some(PLACEHOLDER_COLOR));
		assert_eq!(dom.get_attr(node, "data-lazy-placeholder").as_deref(), Some("color"));
		assert_eq!(dom.get_attr(node, "data-aspect-ratio").as_deref(), Some("16/9"));
		assert_eq!(dom.get_attr(node, "data-id").as_deref(), Some("lazy-abc"));
	}

	#[test]
	fn link_classification_and_data_values() {
		let mut dom = MemoryDom::new();
		let css = dom.insert(ElementTag::Link, &[("data-href", "/site.css"), ("data-id", "css")]);
		let font = dom.insert(ElementTag::Link, &[("data-font", "/f.woff2"), ("data-id", "font")]);
		let script = dom.insert(ElementTag::Script, &[("data-src", "/app.js"), ("data-id", "js")]);

		let css = managed(scan_element(&mut dom, css, |_| false, String::new));
		let font = managed(scan_element(&mut dom, font, |_| false, String::new));
		let script = managed(scan_element(&mut dom, script, |_| false, String::new));

		assert_eq!((css.kind, css.binding.attr(), css.deferred_value.as_deref()), (ResourceKind::Stylesheet, "href", Some("/site.css")));
		assert_eq!((font.kind, font.deferred_value.as_deref()), (ResourceKind::Font, Some("/f.woff2")));
		assert_eq!((script.kind, script.deferred_value.as_deref()), (ResourceKind::Script, Some("/app.js")));
	}

	#[test]
	fn inline_background_moves_into_descriptor() {
		let mut dom = MemoryDom::new();
		let node = dom.insert(ElementTag::Other, &[("data-id", "bg"), ("data-lazy-animation", "")]);
		dom.set_inline_style(node, "background-image", "url('/tile.jpg')");
		let d = managed(scan_element(&mut dom, node, |_| false, String::new));

		assert_eq!(d.background_value.as_deref(), Some("/tile.jpg"));
		assert_eq!(dom.get_style(node, "background-image").as_deref(), Some(""));
		assert!(!d.animated, "animation pausing only applies to media");
	}

	#[test]
	fn skips_opted_out_and_session_loaded() {
		let mut dom = MemoryDom::new();
		let a = dom.insert(ElementTag::Img, &[("data-lazy-skip", "")]);
		let b = dom.insert(ElementTag::Img, &[("data-id", "done"), ("src", "/x.png")]);
		assert!(matches!(scan_element(&mut dom, a, |_| false, String::new), Scanned::Skip(SkipCause::OptedOut)));
		assert!(matches!(scan_element(&mut dom, b, |id| id == "done", String::new), Scanned::Skip(SkipCause::SessionLoaded)));
		assert_eq!(dom.get_attr(b, "src").as_deref(), Some("/x.png"), "loaded elements are left alone");
	}

	#[test]
	fn bad_priority_falls_back_to_low() {
		let mut dom = MemoryDom::new();
		let node = dom.insert(ElementTag::Img, &[("data-priority", "urgent"), ("data-id", "p")]);
		assert_eq!(managed(scan_element(&mut dom, node, |_| false, String::new)).priority, Priority::Low);
	}

	#[test]
	fn css_url_variants() {
		assert_eq!(css_url("url(/a.png)"), Some("/a.png"));
		assert_eq!(css_url(r#" url("/b.png") "#), Some("/b.png"));
		assert_eq!(css_url("url('')"), None);
		assert_eq!(css_url("none"), None);
	}

	#[test]
	fn generated_ids_are_distinct() {
		let ids: std::collections::HashSet<_> = (0..500).map(generated_id).collect();
		assert_eq!(ids.len(), 500);
		assert!(ids.iter().all(|id| id.starts_with("lazy-")));
	}
}
