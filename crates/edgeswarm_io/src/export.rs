//! Files handed to firmware builds: `nca_params_<name>.json` and
//! `nca_params_<name>.h`.

use crate::error::{IoError, Result};
use crate::serialization::write_json_file;
use edgeswarm_data::{
    ExportedParams, NumericRepr, ParamSet, CONTROLLER_HIDDEN, CONTROLLER_INPUTS,
    CONTROLLER_OUTPUTS,
};
use std::fmt::{Display, Write as _};
use std::path::{Path, PathBuf};

fn file_stem(params: &ExportedParams) -> String {
    format!("nca_params_{}", params.name)
}

pub fn write_params_json<P: AsRef<Path>>(params: &ExportedParams, dir: P) -> Result<PathBuf> {
    let path = dir.as_ref().join(format!("{}.json", file_stem(params)));
    write_json_file(params, &path)?;
    Ok(path)
}

pub fn write_c_header<P: AsRef<Path>>(params: &ExportedParams, dir: P) -> Result<PathBuf> {
    let path = dir.as_ref().join(format!("{}.h", file_stem(params)));
    std::fs::write(&path, render_c_header(params)).map_err(|e| {
        IoError::FileSystem(e).with_context(format!("writing header to {:?}", path))
    })?;
    Ok(path)
}

fn c_float(v: f32) -> String {
    format!("{v:?}f")
}

fn row<T: Copy>(values: &[T], fmt: impl Fn(T) -> String) -> String {
    values.iter().map(|&v| fmt(v)).collect::<Vec<_>>().join(", ")
}

fn matrix<T: Copy, const C: usize>(rows: &[[T; C]], fmt: &impl Fn(T) -> String) -> String {
    rows.iter()
        .map(|r| format!("    {{{}}}", row(r, fmt)))
        .collect::<Vec<_>>()
        .join(",\n")
}

fn emit_layers<T: Copy>(
    out: &mut String,
    ctype: &str,
    params: &ParamSet<T>,
    fmt: impl Fn(T) -> String,
) {
    let _ = write!(
        out,
        "\
// Layer 1: {inputs} x {hidden}
static const {ctype} w1[NCA_INPUT_SIZE][NCA_HIDDEN_SIZE] = {{
{w1}
}};

static const {ctype} b1[NCA_HIDDEN_SIZE] = {{
    {b1}
}};

// Layer 2: {hidden} x {outputs}
static const {ctype} w2[NCA_HIDDEN_SIZE][NCA_OUTPUT_SIZE] = {{
{w2}
}};

static const {ctype} b2[NCA_OUTPUT_SIZE] = {{
    {b2}
}};

",
        inputs = CONTROLLER_INPUTS,
        hidden = CONTROLLER_HIDDEN,
        outputs = CONTROLLER_OUTPUTS,
        w1 = matrix(&params.w1, &fmt),
        b1 = row(&params.b1, &fmt),
        w2 = matrix(&params.w2, &fmt),
        b2 = row(&params.b2, &fmt),
    );
}

fn define(out: &mut String, name: &str, value: impl Display) {
    let _ = writeln!(out, "#define {name:<20}{value}");
}

/// C header with architecture defines, weights, biases and the runtime
/// configuration record.
#[must_use]
pub fn render_c_header(params: &ExportedParams) -> String {
    let guard = format!("NCA_PARAMS_{}_H", params.name.to_uppercase());
    let mut out = String::new();
    let _ = writeln!(out, "/* Generated controller parameters: {} */\n", params.name);
    let _ = writeln!(out, "#ifndef {guard}\n#define {guard}\n\n#include <stdint.h>\n");
    define(&mut out, "NCA_INPUT_SIZE", CONTROLLER_INPUTS);
    define(&mut out, "NCA_HIDDEN_SIZE", CONTROLLER_HIDDEN);
    define(&mut out, "NCA_OUTPUT_SIZE", CONTROLLER_OUTPUTS);

    match &params.repr {
        NumericRepr::Float { params: set } => {
            define(&mut out, "NCA_FIXED_POINT", 0);
            out.push('\n');
            emit_layers(&mut out, "float", set, c_float);
        }
        NumericRepr::Fixed {
            frac_bits,
            params: set,
        } => {
            define(&mut out, "NCA_FIXED_POINT", 1);
            define(&mut out, "NCA_FRAC_BITS", frac_bits);
            out.push('\n');
            emit_layers(&mut out, "int32_t", set, |v: i32| v.to_string());
        }
    }

    let c = &params.config;
    let _ = write!(
        out,
        "\
typedef struct {{
    float max_speed;
    float noise_scale;
    float noise_decay;
    float communication_range;
    float position_scale;
    float neighbor_scale;
}} nca_config_t;

static const nca_config_t default_config = {{
    .max_speed = {},
    .noise_scale = {},
    .noise_decay = {},
    .communication_range = {},
    .position_scale = {},
    .neighbor_scale = {}
}};

#endif // {guard}
",
        c_float(c.max_speed as f32),
        c_float(c.noise_scale as f32),
        c_float(c.noise_decay as f32),
        c_float(c.communication_range as f32),
        c_float(c.position_scale as f32),
        c_float(c.neighbor_scale as f32),
    );
    out
}
