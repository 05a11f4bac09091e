//! SVG export serializer.
//!
//! Converts a stipple path into an SVG string using the [`svg`] crate
//! for document construction, XML escaping, and path data formatting.
//!
//! The path becomes a single `<path>` element using `M` (move to) and
//! `L` (line to) commands. When [`SvgStyle::dot_radius`] is set, every
//! stipple point is also drawn as a filled `<circle>` inside a `<g>`.
//!
//! Optional [`SvgMetadata`] embeds `<title>` and `<desc>` elements for
//! accessibility and to help file managers identify exported files.
//!
//! This is a pure function with no I/O -- it returns a `String`.

use svg::Document;
use svg::node::element::path::Data;
use svg::node::element::{Circle, Description, Element, Group, Path, Title};
use svg::node::{Node, Text, Value};

use stipple_pipeline::{Dimensions, Polyline, StipplePath};

/// Metadata to embed in the SVG document.
///
/// All fields are optional. When present, a `<title>` and/or `<desc>`
/// element is emitted immediately after the opening `<svg>` tag.
///
/// Text values are XML-escaped automatically by the `svg` crate.
#[derive(Debug, Clone, Default)]
pub struct SvgMetadata<'a> {
    /// Document title, emitted as `<title>`.
    ///
    /// Typically the source image filename (without extension).
    pub title: Option<&'a str>,

    /// Document description, emitted as `<desc>`.
    pub description: Option<&'a str>,

    /// Serialized pipeline parameters, emitted inside a `<metadata>`
    /// element wrapped in a namespaced `<stipple:parameters>` element so
    /// exported files carry machine-parseable settings.
    pub parameters_json: Option<&'a str>,
}

/// Stroke and dot styling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SvgStyle {
    /// Path stroke width in pixels.
    pub stroke_width: f64,

    /// Radius of the dot drawn at each stipple point. `None` draws the
    /// path only.
    pub dot_radius: Option<f64>,
}

impl SvgStyle {
    /// Default path stroke width.
    pub const DEFAULT_STROKE_WIDTH: f64 = 1.0;
}

impl Default for SvgStyle {
    fn default() -> Self {
        Self {
            stroke_width: Self::DEFAULT_STROKE_WIDTH,
            dot_radius: None,
        }
    }
}

/// Build an SVG path `d` attribute string from a polyline.
///
/// Uses `M` for the first point and `L` for subsequent points.
/// Returns an empty string for polylines with fewer than 2 points.
///
/// Coordinates are formatted by the [`svg`] crate using `f32` precision
/// (sufficient for pixel-derived coordinates from the pipeline).
///
/// # Examples
///
/// ```
/// use stipple_pipeline::{Point, Polyline};
/// use stipple_export::build_path_data;
///
/// let polyline = Polyline::new(vec![
///     Point::new(10.0, 20.0),
///     Point::new(30.0, 40.0),
/// ]);
/// let d = build_path_data(&polyline);
/// assert_eq!(d, "M10,20 L30,40");
/// ```
#[must_use]
pub fn build_path_data(polyline: &Polyline) -> String {
    let points = polyline.points();
    if points.len() < 2 {
        return String::new();
    }

    let first = &points[0];
    let mut data = Data::new().move_to((first.x, first.y));
    for p in &points[1..] {
        data = data.line_to((p.x, p.y));
    }
    String::from(Value::from(data))
}

/// Serialize a stipple path to an SVG document string.
///
/// The `viewBox` is the source image in pixels, so path coordinates are
/// written unchanged. A path with fewer than two points produces no
/// `<path>` element; dots are still drawn when requested.
#[must_use]
pub fn to_svg(
    path: &StipplePath,
    dimensions: Dimensions,
    metadata: &SvgMetadata<'_>,
    style: &SvgStyle,
) -> String {
    let (w, h) = (dimensions.width, dimensions.height);
    let mut doc = Document::new()
        .set("width", w)
        .set("height", h)
        .set("viewBox", (0, 0, w, h));

    if let Some(title) = metadata.title {
        doc = doc.add(Title::new(title));
    }

    if let Some(description) = metadata.description {
        doc = doc.add(Description::new().add(Text::new(description)));
    }

    if let Some(parameters_json) = metadata.parameters_json {
        let mut parameters = Element::new("stipple:parameters");
        parameters.assign("xmlns:stipple", "urn:stipple:parameters:1");
        parameters.append(Text::new(parameters_json));
        let mut metadata_el = Element::new("metadata");
        metadata_el.append(parameters);
        doc = doc.add(metadata_el);
    }

    let d = build_path_data(&path.to_polyline());
    if !d.is_empty() {
        doc = doc.add(
            Path::new()
                .set("d", d)
                .set("fill", "none")
                .set("stroke", "black")
                .set("stroke-width", style.stroke_width)
                .set("stroke-linejoin", "round")
                .set("stroke-linecap", "round"),
        );
    }

    if let Some(radius) = style.dot_radius
        && !path.is_empty()
    {
        let mut dots = Group::new().set("fill", "black");
        for p in &path.points {
            dots = dots.add(Circle::new().set("cx", p.x).set("cy", p.y).set("r", radius));
        }
        doc = doc.add(dots);
    }

    // The svg crate omits the XML declaration, so we prepend it.
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use stipple_pipeline::{PipelineParameters, Point, SamplePoint, build_path};

    use super::*;

    fn dims(width: u32, height: u32) -> Dimensions {
        Dimensions { width, height }
    }

    fn no_meta() -> SvgMetadata<'static> {
        SvgMetadata::default()
    }

    fn path_through(points: &[(f64, f64)]) -> StipplePath {
        let points: Vec<_> = points.iter().map(|&(x, y)| SamplePoint::new(x, y)).collect();
        build_path(&points, &PipelineParameters::default())
    }

    // --- build_path_data ---

    #[test]
    fn build_path_data_empty_polyline() {
        assert_eq!(build_path_data(&Polyline::new(vec![])), "");
    }

    #[test]
    fn build_path_data_single_point() {
        let polyline = Polyline::new(vec![Point::new(5.0, 5.0)]);
        assert_eq!(build_path_data(&polyline), "");
    }

    #[test]
    fn build_path_data_three_points() {
        let polyline = Polyline::new(vec![
            Point::new(10.0, 15.0),
            Point::new(12.5, 18.3),
            Point::new(14.0, 20.1),
        ]);
        assert_eq!(build_path_data(&polyline), "M10,15 L12.5,18.3 L14,20.1");
    }

    // --- Document structure ---

    #[test]
    fn empty_path_produces_valid_svg_with_no_elements() {
        let svg = to_svg(&StipplePath::empty(), dims(100, 50), &no_meta(), &SvgStyle::default());
        assert!(svg.contains(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(svg.contains(r#"viewBox="0 0 100 50""#));
        assert!(!svg.contains("<path"));
        assert!(!svg.contains("<circle"));
        assert!(svg.trim_end().ends_with("/>"));
    }

    #[test]
    fn path_follows_solver_order() {
        // Solver starts at the topmost point.
        let path = path_through(&[(10.0, 40.0), (30.0, 10.0)]);
        let svg = to_svg(&path, dims(800, 600), &no_meta(), &SvgStyle::default());
        assert!(svg.contains(r#"d="M30,10 L10,40""#));
        assert!(svg.contains(r#"fill="none""#));
        assert!(svg.contains(r#"stroke-width="1""#));
        assert_eq!(svg.matches("<path").count(), 1);
    }

    #[test]
    fn dots_drawn_per_point() {
        let path = path_through(&[(0.0, 0.0), (20.0, 0.0), (10.0, 15.0)]);
        let style = SvgStyle {
            dot_radius: Some(1.5),
            ..SvgStyle::default()
        };
        let svg = to_svg(&path, dims(40, 40), &no_meta(), &style);
        assert_eq!(svg.matches("<circle").count(), 3);
        assert!(svg.contains(r#"r="1.5""#));
        let path_pos = svg.find("<path").unwrap();
        let dots_pos = svg.find("<g").unwrap();
        assert!(path_pos < dots_pos, "dots are drawn over the path");
    }

    #[test]
    fn single_point_draws_dot_without_path() {
        let path = path_through(&[(5.0, 5.0)]);
        let style = SvgStyle {
            dot_radius: Some(2.0),
            ..SvgStyle::default()
        };
        let svg = to_svg(&path, dims(10, 10), &no_meta(), &style);
        assert!(!svg.contains("<path"));
        assert_eq!(svg.matches("<circle").count(), 1);
    }

    #[test]
    fn custom_stroke_width() {
        let path = path_through(&[(0.0, 0.0), (5.0, 5.0)]);
        let style = SvgStyle {
            stroke_width: 0.35,
            dot_radius: None,
        };
        let svg = to_svg(&path, dims(10, 10), &no_meta(), &style);
        assert!(svg.contains(r#"stroke-width="0.35""#));
    }

    // --- Metadata ---

    #[test]
    fn title_and_desc_emitted_before_path() {
        let meta = SvgMetadata {
            title: Some("portrait"),
            description: Some("min_distance=8"),
            ..SvgMetadata::default()
        };
        let path = path_through(&[(0.0, 0.0), (5.0, 5.0)]);
        let svg = to_svg(&path, dims(10, 10), &meta, &SvgStyle::default());
        let title_pos = svg.find("<title>portrait</title>").unwrap();
        let desc_pos = svg.find("<desc>min_distance=8</desc>").unwrap();
        let path_pos = svg.find("<path").unwrap();
        assert!(title_pos < desc_pos && desc_pos < path_pos);
    }

    #[test]
    fn title_and_desc_omitted_when_none() {
        let svg = to_svg(&StipplePath::empty(), dims(10, 10), &no_meta(), &SvgStyle::default());
        assert!(!svg.contains("<title>"));
        assert!(!svg.contains("<desc>"));
        assert!(!svg.contains("<metadata>"));
    }

    #[test]
    fn special_characters_are_escaped() {
        let meta = SvgMetadata {
            title: Some("A <B> & C"),
            description: Some("x < y"),
            ..SvgMetadata::default()
        };
        let svg = to_svg(&StipplePath::empty(), dims(10, 10), &meta, &SvgStyle::default());
        assert!(svg.contains("<title>A &lt;B&gt; &amp; C</title>"));
        assert!(svg.contains("<desc>x &lt; y</desc>"));
    }

    #[test]
    fn parameters_metadata_is_namespaced() {
        let meta = SvgMetadata {
            parameters_json: Some(r#"{"gamma":1.2}"#),
            ..SvgMetadata::default()
        };
        let svg = to_svg(&StipplePath::empty(), dims(10, 10), &meta, &SvgStyle::default());
        assert!(svg.contains("<metadata>"));
        assert!(
            svg.contains(r#"<stipple:parameters xmlns:stipple="urn:stipple:parameters:1">"#)
        );
        assert!(svg.contains("</stipple:parameters>"));
    }
}
