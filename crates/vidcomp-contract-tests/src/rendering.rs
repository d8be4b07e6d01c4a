//! Rendering contracts checked against the fake GL driver.
#![allow(unsafe_code)]

use std::fs;
use std::path::PathBuf;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use vidcomp_core::CompositorConfig;
use vidcomp_runtime::runtime_contract::{
    sampler_name_for, sampler_unit_for, texture_size_name_for, A_POSITION, A_TEXTURE_COORD,
    I_SIZE, U_MVP_MATRIX, U_ST_MATRIX,
};
use vidcomp_runtime_glow::shaders::{FADE_FRAG, QUAD_VERT};
use vidcomp_runtime_glow::testing::{FakeGl, ScriptedProducer};
use vidcomp_runtime_glow::{Compositor, ShaderProgram, UniformKind};

const SIZED_EFFECT_FRAG: &str = r#"#version 330 core
in vec2 vTextureCoord;
out vec4 fragColor;

uniform sampler2D i_texture_1;
uniform vec2 i_texture_size_1;
uniform vec2 i_size;

void main() {
    vec2 texel = 1.0 / max(i_texture_size_1, vec2(1.0));
    fragColor = texture(i_texture_1, vTextureCoord + texel * 0.0) * (i_size.x > 0.0 ? 1.0 : 0.0);
}
"#;

fn write_temp_shader(name: &str, contents: &str) -> PathBuf {
    let mut p = std::env::temp_dir();
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    p.push(format!("vidcomp_contract_tests_{name}_{ts}.frag"));
    fs::write(&p, contents).expect("write shader");
    p
}

fn slot_names(p: &ShaderProgram) -> (Vec<String>, Vec<String>) {
    (
        p.attributes().iter().map(|a| a.name().to_string()).collect(),
        p.uniforms().iter().map(|u| u.name().to_string()).collect(),
    )
}

#[test]
fn slot_discovery_is_deterministic() {
    let a = FakeGl::new();
    let b = FakeGl::new();
    let pa = unsafe { ShaderProgram::new(&a, QUAD_VERT, FADE_FRAG) }.unwrap();
    let pb = unsafe { ShaderProgram::new(&b, QUAD_VERT, FADE_FRAG) }.unwrap();

    assert_eq!(slot_names(&pa), slot_names(&pb));
    for attr in pa.attributes() {
        assert_eq!(
            attr.location(),
            pb.attribute(attr.name()).unwrap().location(),
            "{}",
            attr.name()
        );
    }
}

#[test]
fn builtin_vertex_stage_declares_the_quad_contract() {
    let gl = FakeGl::new();
    let p = unsafe { ShaderProgram::new(&gl, QUAD_VERT, FADE_FRAG) }.unwrap();

    assert!(p.has_attribute(A_POSITION));
    assert!(p.has_attribute(A_TEXTURE_COORD));
    assert_eq!(p.uniform_kind(U_MVP_MATRIX).unwrap(), UniformKind::Matrix4);
    assert_eq!(p.uniform_kind(U_ST_MATRIX).unwrap(), UniformKind::Matrix4);
    for i in 0..2 {
        assert_eq!(
            p.uniform_kind(&sampler_name_for(i)).unwrap(),
            UniformKind::Sampler2D
        );
    }
}

#[test]
fn identical_frames_leave_identical_driver_state() {
    let render = || {
        let gl = FakeGl::new();
        let mut c = unsafe { Compositor::from_config(&gl, &CompositorConfig::default()) }.unwrap();
        for rgba in [[255, 0, 0, 255], [0, 0, 255, 255]] {
            let mut producer = ScriptedProducer::new(4, 4);
            producer.push_solid_frame(4, 4, rgba);
            unsafe { c.add_source(&gl, Box::new(producer)) }.unwrap();
        }
        let now = Instant::now();
        c.start_transition(now);
        unsafe { c.render_frame(&gl, now) }.unwrap();
        unsafe { c.render_frame(&gl, now) }.unwrap();
        let snapshot = gl.snapshot();
        unsafe { c.destroy(&gl) };
        snapshot
    };

    assert_eq!(render(), render());
}

#[test]
fn sources_bind_to_consecutive_units() {
    let gl = FakeGl::new();
    let cfg = CompositorConfig {
        effect: "fade".into(),
        ..CompositorConfig::default()
    };
    let mut c = unsafe { Compositor::from_config(&gl, &cfg) }.unwrap();
    for _ in 0..2 {
        let mut producer = ScriptedProducer::new(2, 2);
        producer.push_solid_frame(2, 2, [1, 2, 3, 4]);
        unsafe { c.add_source(&gl, Box::new(producer)) }.unwrap();
    }

    unsafe { c.render_frame(&gl, Instant::now()) }.unwrap();

    let effect = c.effect_program().handle().unwrap();
    for (i, source) in c.sources().iter().enumerate() {
        let unit = sampler_unit_for(i);
        assert_eq!(gl.bound_texture(unit, glow::TEXTURE_2D), Some(source.texture()));
        assert_eq!(gl.uniform_int(effect, &sampler_name_for(i)), Some(unit as i32));
    }
}

#[test]
fn effect_override_receives_optional_size_uniforms() {
    let path = write_temp_shader("sized_effect", SIZED_EFFECT_FRAG);
    let gl = FakeGl::new();
    let cfg = CompositorConfig {
        effect: "glitch".into(),
        effect_shader: Some(path.clone()),
        width: 320,
        height: 240,
        ..CompositorConfig::default()
    };

    let mut c = unsafe { Compositor::from_config(&gl, &cfg) }.unwrap();
    let mut producer = ScriptedProducer::new(2, 2);
    producer.push_solid_frame(2, 2, [0, 0, 0, 255]);
    unsafe { c.add_source(&gl, Box::new(producer)) }.unwrap();
    unsafe { c.render_frame(&gl, Instant::now()) }.unwrap();

    let effect = c.effect_program().handle().unwrap();
    assert_eq!(gl.uniform_value(effect, I_SIZE).unwrap(), [320.0, 240.0]);
    assert_eq!(
        gl.uniform_value(effect, &texture_size_name_for(0)).unwrap(),
        [320.0, 240.0]
    );
    assert_eq!(gl.last_viewport(), (0, 0, 320, 240));

    unsafe { c.destroy(&gl) };
    assert_eq!(gl.live_programs(), 0);
    assert_eq!(gl.live_textures(), 0);

    let _ = fs::remove_file(path);
}
