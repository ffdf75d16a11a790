use serde::{Deserialize, Serialize};

/// Resource kind of a managed element.
///
/// Each kind is watched by its own visibility detector with its own trigger
/// threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
	/// Images, videos and anything else bound through a plain attribute.
	#[default]
	ImageLike,
	/// `<script>` elements.
	Script,
	/// `<link>` elements carrying a deferred stylesheet.
	Stylesheet,
	/// `<link>` elements carrying a deferred font.
	Font,
}

impl ResourceKind {
	/// All kinds, in detector construction order.
	pub const ALL: [ResourceKind; 4] = [Self::ImageLike, Self::Script, Self::Stylesheet, Self::Font];

	/// Label written back to `data-lazy-type`.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::ImageLike => "default",
			Self::Script => "script",
			Self::Stylesheet => "css",
			Self::Font => "font",
		}
	}

	/// Parses a `data-lazy-type` label. Unknown labels fall back to [`ResourceKind::ImageLike`].
	pub fn from_label(label: &str) -> Self {
		match label {
			"script" => Self::Script,
			"css" => Self::Stylesheet,
			"font" => Self::Font,
			_ => Self::ImageLike,
		}
	}

	/// Dense index used for per-kind tables.
	pub const fn index(self) -> usize {
		match self {
			Self::ImageLike => 0,
			Self::Script => 1,
			Self::Stylesheet => 2,
			Self::Font => 3,
		}
	}
}

/// Element tag, reduced to the cases the engine distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementTag {
	Img,
	Video,
	Script,
	Link,
	Other,
}

impl ElementTag {
	/// Maps a host tag name (any case) to an [`ElementTag`].
	pub fn from_name(name: &str) -> Self {
		if name.eq_ignore_ascii_case("img") {
			Self::Img
		} else if name.eq_ignore_ascii_case("video") {
			Self::Video
		} else if name.eq_ignore_ascii_case("script") {
			Self::Script
		} else if name.eq_ignore_ascii_case("link") {
			Self::Link
		} else {
			Self::Other
		}
	}

	/// Whether the element renders visual media and may carry a placeholder.
	pub const fn is_media(self) -> bool {
		matches!(self, Self::Img | Self::Video)
	}

	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Img => "img",
			Self::Video => "video",
			Self::Script => "script",
			Self::Link => "link",
			Self::Other => "other",
		}
	}
}

/// Destination hint attached to a preload request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreloadAs {
	Image,
	Video,
	Style,
	Script,
}

impl PreloadAs {
	/// Preload destination for an element tag. Anything unrecognised preloads as a script.
	pub const fn for_tag(tag: ElementTag) -> Self {
		match tag {
			ElementTag::Img => Self::Image,
			ElementTag::Video => Self::Video,
			ElementTag::Link => Self::Style,
			ElementTag::Script | ElementTag::Other => Self::Script,
		}
	}

	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Image => "image",
			Self::Video => "video",
			Self::Style => "style",
			Self::Script => "script",
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn labels_roundtrip_through_lazy_type() {
		for kind in ResourceKind::ALL {
			assert_eq!(ResourceKind::from_label(kind.as_str()), kind);
		}
		assert_eq!(ResourceKind::from_label("bogus"), ResourceKind::ImageLike);
	}

	#[test]
	fn tag_names_are_case_insensitive() {
		assert_eq!(ElementTag::from_name("IMG"), ElementTag::Img);
		assert_eq!(ElementTag::from_name("Link"), ElementTag::Link);
		assert_eq!(ElementTag::from_name("iframe"), ElementTag::Other);
	}

	#[test]
	fn preload_destination_follows_tag() {
		assert_eq!(PreloadAs::for_tag(ElementTag::Video), PreloadAs::Video);
		assert_eq!(PreloadAs::for_tag(ElementTag::Link), PreloadAs::Style);
		assert_eq!(PreloadAs::for_tag(ElementTag::Other), PreloadAs::Script);
	}
}
