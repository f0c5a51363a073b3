//! Scene XML parser.
//!
//! Parses the scene dialect into [`SceneDescription`] without judging
//! cross-element consistency; that is the loader's job. Attribute-local
//! constraints (positivity, ranges, formats) are checked here so error
//! messages can point at the offending attribute.

use std::io::BufRead;

use nalgebra::Vector2;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::warn;

use shear2d_types::{
    Force, Geometry, ImpactOperatorConfig, ImpactOperatorKind, IntegratorConfig, IntegratorKind,
    SobogusConfig, StaggeredProjectionsConfig, StaggeringKind, StaticPlane, Timestep,
};

use crate::error::{Result, SceneError};
use crate::types::{BodySpec, LeesEdwardsSpec, PortalSpec, SceneDescription};

/// Parse a scene document from a string.
///
/// # Errors
///
/// Returns an error when the XML is malformed, the root element is
/// missing, or an attribute fails its local constraint.
pub fn parse_scene_str(xml: &str) -> Result<SceneDescription> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut scene: Option<SceneDescription> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"shear2d_scene" => {
                scene = Some(parse_scene_children(&mut reader)?);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(SceneError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    scene.ok_or(SceneError::MissingElement {
        element: "shear2d_scene",
    })
}

fn parse_scene_children<R: BufRead>(reader: &mut Reader<R>) -> Result<SceneDescription> {
    let mut scene = SceneDescription::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) => handle_element(&mut scene, e)?,
            Ok(Event::Start(ref e)) => {
                let name = e.name().as_ref().to_vec();
                handle_element(&mut scene, e)?;
                skip_element(reader, &name)?;
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"shear2d_scene" => break,
            Ok(Event::Eof) => {
                return Err(SceneError::XmlParse(
                    "unexpected EOF inside shear2d_scene".into(),
                ))
            }
            Ok(_) => {}
            Err(e) => return Err(SceneError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    Ok(scene)
}

fn handle_element(scene: &mut SceneDescription, e: &BytesStart) -> Result<()> {
    match e.name().as_ref() {
        b"end_time" => {
            let t = required_scalar(e, "t", "end_time")?;
            if !(t.is_finite() && t > 0.0) && t != f64::INFINITY {
                return Err(SceneError::invalid_attribute(
                    "t",
                    "end_time",
                    "must be a positive scalar",
                ));
            }
            scene.end_time = Some(t);
        }
        b"scripting" => {
            scene.scripting_callback = attribute(e, "callback")?;
        }
        // Presentation settings are not part of the simulation
        b"camera" => {}
        b"gravity" => {
            let g = required_vector2(e, "f", "gravity")?;
            scene.forces.push(Force::Gravity { g });
        }
        b"hertzian_penalty" => {
            let k = required_scalar(e, "k", "hertzian_penalty")?;
            if !(k.is_finite() && k > 0.0) {
                return Err(SceneError::invalid_attribute(
                    "k",
                    "hertzian_penalty",
                    "stiffness must be positive",
                ));
            }
            scene.forces.push(Force::HertzianPenalty { k });
        }
        b"integrator" => {
            let kind_name = required_attribute(e, "type", "integrator")?;
            let kind = IntegratorKind::from_name(&kind_name).ok_or_else(|| {
                SceneError::invalid_attribute(
                    "type",
                    "integrator",
                    format!("unknown integrator '{kind_name}'"),
                )
            })?;
            let dt_string = required_attribute(e, "dt", "integrator")?;
            let dt: Timestep = dt_string.parse().map_err(|_| {
                SceneError::invalid_attribute(
                    "dt",
                    "integrator",
                    format!("'{dt_string}' is not a positive rational"),
                )
            })?;
            scene.integrator = Some(IntegratorConfig { kind, dt });
        }
        b"impact_operator" => {
            let kind_name = required_attribute(e, "type", "impact_operator")?;
            let kind = ImpactOperatorKind::from_name(&kind_name).ok_or_else(|| {
                SceneError::invalid_attribute(
                    "type",
                    "impact_operator",
                    format!("unknown operator '{kind_name}'"),
                )
            })?;
            scene.impact_operator = Some(ImpactOperatorConfig {
                kind,
                cor: required_scalar(e, "CoR", "impact_operator")?,
                max_iters: optional_count(e, "max_iters", "impact_operator")?.unwrap_or(100),
                tol: optional_scalar(e, "tol", "impact_operator")?.unwrap_or(1.0e-9),
            });
        }
        b"staggered_projections_friction_solver" => {
            let element = "staggered_projections_friction_solver";
            let staggering = staggering_kind(e, element)?;
            scene.staggered_solver = Some(StaggeredProjectionsConfig {
                mu: required_scalar(e, "mu", element)?,
                cor: required_scalar(e, "CoR", element)?,
                max_iters: optional_count(e, "max_iters", element)?.unwrap_or(50),
                tol: optional_scalar(e, "tol", element)?.unwrap_or(1.0e-8),
                staggering,
                warm_start_alpha: optional_flag(e, "internal_warm_start_alpha", element)?
                    .unwrap_or(true),
                warm_start_beta: optional_flag(e, "internal_warm_start_beta", element)?
                    .unwrap_or(true),
            });
        }
        b"sobogus_friction_solver" => {
            let element = "sobogus_friction_solver";
            let staggering = staggering_kind(e, element)?;
            let max_iters = optional_count(e, "max_iters", element)?.unwrap_or(50);
            scene.sobogus_solver = Some(SobogusConfig {
                mu: required_scalar(e, "mu", element)?,
                cor: required_scalar(e, "CoR", element)?,
                max_iters,
                eval_every: optional_count(e, "eval_every", element)?.unwrap_or(1),
                tol: optional_scalar(e, "tol", element)?.unwrap_or(1.0e-8),
                staggering,
            });
        }
        b"static_plane" => {
            let x = required_vector2(e, "x", "static_plane")?;
            let n = required_vector2(e, "n", "static_plane")?;
            scene.planes.push(StaticPlane::new(x, n)?);
        }
        b"planar_portal" => {
            scene.portals.push(PortalSpec {
                plane_a: required_count(e, "planeA", "planar_portal")?,
                plane_b: required_count(e, "planeB", "planar_portal")?,
                lees_edwards: None,
            });
        }
        b"lees_edwards_portal" => {
            let element = "lees_edwards_portal";
            scene.portals.push(PortalSpec {
                plane_a: required_count(e, "planeA", element)?,
                plane_b: required_count(e, "planeB", element)?,
                lees_edwards: Some(LeesEdwardsSpec {
                    v_a: required_scalar(e, "va", element)?,
                    v_b: required_scalar(e, "vb", element)?,
                    bounds_a: required_pair(e, "boundsa", element)?,
                    bounds_b: required_pair(e, "boundsb", element)?,
                }),
            });
        }
        b"circle" => {
            let r = required_scalar(e, "r", "circle")?;
            if !(r.is_finite() && r > 0.0) {
                return Err(SceneError::invalid_attribute(
                    "r",
                    "circle",
                    "radius must be positive",
                ));
            }
            scene.geometry.push(Geometry::circle(r));
        }
        b"body" => {
            let element = "body";
            scene.bodies.push(BodySpec {
                x: required_vector2(e, "x", element)?,
                theta: optional_scalar(e, "theta", element)?.unwrap_or(0.0),
                v: optional_vector2(e, "v", element)?.unwrap_or_else(Vector2::zeros),
                omega: optional_scalar(e, "omega", element)?.unwrap_or(0.0),
                m: required_scalar(e, "m", element)?,
                inertia: required_scalar(e, "I", element)?,
                geo: optional_count(e, "geo", element)?.unwrap_or(0),
            });
        }
        other => {
            warn!(
                element = String::from_utf8_lossy(other).as_ref(),
                "skipping unknown scene element"
            );
        }
    }
    Ok(())
}

fn skip_element<R: BufRead>(reader: &mut Reader<R>, name: &[u8]) -> Result<()> {
    let mut depth = 1usize;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == name => depth += 1,
            Ok(Event::End(ref e)) if e.name().as_ref() == name => {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
            Ok(Event::Eof) => {
                return Err(SceneError::XmlParse("unexpected EOF in element".into()))
            }
            Ok(_) => {}
            Err(e) => return Err(SceneError::XmlParse(e.to_string())),
        }
        buf.clear();
    }
}

// -------------------------------------------------------------------
// Attribute helpers
// -------------------------------------------------------------------

fn attribute(e: &BytesStart, name: &str) -> Result<Option<String>> {
    match e.try_get_attribute(name) {
        Ok(Some(attr)) => attr
            .unescape_value()
            .map(|value| Some(value.into_owned()))
            .map_err(|err| SceneError::XmlParse(err.to_string())),
        Ok(None) => Ok(None),
        Err(err) => Err(SceneError::XmlParse(err.to_string())),
    }
}

fn required_attribute(
    e: &BytesStart,
    name: &'static str,
    element: &'static str,
) -> Result<String> {
    attribute(e, name)?.ok_or_else(|| SceneError::missing_attribute(name, element))
}

fn parse_f64(value: &str, name: &'static str, element: &'static str) -> Result<f64> {
    value.trim().parse().map_err(|_| {
        SceneError::invalid_attribute(name, element, format!("'{value}' is not a scalar"))
    })
}

fn required_scalar(e: &BytesStart, name: &'static str, element: &'static str) -> Result<f64> {
    let value = required_attribute(e, name, element)?;
    parse_f64(&value, name, element)
}

fn optional_scalar(
    e: &BytesStart,
    name: &'static str,
    element: &'static str,
) -> Result<Option<f64>> {
    attribute(e, name)?
        .map(|value| parse_f64(&value, name, element))
        .transpose()
}

fn required_count(e: &BytesStart, name: &'static str, element: &'static str) -> Result<usize> {
    let value = required_attribute(e, name, element)?;
    value.trim().parse().map_err(|_| {
        SceneError::invalid_attribute(
            name,
            element,
            format!("'{value}' is not an unsigned integer"),
        )
    })
}

fn optional_count(
    e: &BytesStart,
    name: &'static str,
    element: &'static str,
) -> Result<Option<usize>> {
    attribute(e, name)?
        .map(|value| {
            value.trim().parse().map_err(|_| {
                SceneError::invalid_attribute(
                    name,
                    element,
                    format!("'{value}' is not an unsigned integer"),
                )
            })
        })
        .transpose()
}

fn optional_flag(
    e: &BytesStart,
    name: &'static str,
    element: &'static str,
) -> Result<Option<bool>> {
    attribute(e, name)?
        .map(|value| match value.trim() {
            "0" | "false" => Ok(false),
            "1" | "true" => Ok(true),
            other => Err(SceneError::invalid_attribute(
                name,
                element,
                format!("'{other}' is not a boolean"),
            )),
        })
        .transpose()
}

fn parse_two(value: &str, name: &'static str, element: &'static str) -> Result<(f64, f64)> {
    let mut parts = value.split_whitespace();
    let first = parts.next();
    let second = parts.next();
    match (first, second, parts.next()) {
        (Some(a), Some(b), None) => Ok((
            parse_f64(a, name, element)?,
            parse_f64(b, name, element)?,
        )),
        _ => Err(SceneError::invalid_attribute(
            name,
            element,
            format!("'{value}' must hold exactly two scalars"),
        )),
    }
}

fn required_vector2(
    e: &BytesStart,
    name: &'static str,
    element: &'static str,
) -> Result<Vector2<f64>> {
    let value = required_attribute(e, name, element)?;
    let (x, y) = parse_two(&value, name, element)?;
    Ok(Vector2::new(x, y))
}

fn optional_vector2(
    e: &BytesStart,
    name: &'static str,
    element: &'static str,
) -> Result<Option<Vector2<f64>>> {
    attribute(e, name)?
        .map(|value| {
            let (x, y) = parse_two(&value, name, element)?;
            Ok(Vector2::new(x, y))
        })
        .transpose()
}

fn required_pair(
    e: &BytesStart,
    name: &'static str,
    element: &'static str,
) -> Result<(f64, f64)> {
    let value = required_attribute(e, name, element)?;
    parse_two(&value, name, element)
}

fn staggering_kind(e: &BytesStart, element: &'static str) -> Result<StaggeringKind> {
    match attribute(e, "staggering")? {
        None => Ok(StaggeringKind::Geometric),
        Some(name) => StaggeringKind::from_name(&name).ok_or_else(|| {
            SceneError::invalid_attribute(
                "staggering",
                element,
                format!("unknown staggering '{name}'"),
            )
        }),
    }
}
