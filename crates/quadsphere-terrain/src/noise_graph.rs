//! Procedural height as a tree of noise operators.
//!
//! [`NoiseNode`] is the serializable description. [`NoiseGraph`] pairs it
//! with the built fBm generators and evaluates it; graphs persist as RON.

use std::path::Path;

use noise::{Fbm, MultiFractal, NoiseFn, OpenSimplex, Perlin, Simplex, SuperSimplex, Value};
use serde::{Deserialize, Serialize};

use crate::TerrainError;
use crate::curve::FloatCurve;

/// Base noise sampled by each fBm octave.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FractalKind {
    #[default]
    Perlin,
    Simplex,
    OpenSimplex,
    SuperSimplex,
    Value,
}

/// Parameters of a fractal leaf.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FractalParams {
    pub kind: FractalKind,
    pub seed: u32,
    pub frequency: f64,
    pub octaves: usize,
    pub lacunarity: f64,
    pub persistence: f64,
}

impl Default for FractalParams {
    fn default() -> Self {
        Self {
            kind: FractalKind::Perlin,
            seed: 0,
            frequency: 1.0,
            octaves: 6,
            lacunarity: 2.0,
            persistence: 0.5,
        }
    }
}

/// One operator of a noise graph. Children are owned, so equal subtrees
/// compare equal structurally.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum NoiseNode {
    Fractal(FractalParams),
    Const(f32),

    Abs(Box<NoiseNode>),
    /// Negates its input.
    Invert(Box<NoiseNode>),
    Scale {
        input: Box<NoiseNode>,
        scale: f32,
    },
    ScaleBias {
        input: Box<NoiseNode>,
        scale: f32,
        bias: f32,
    },
    Clamp {
        input: Box<NoiseNode>,
        min: f32,
        max: f32,
    },
    Curve {
        input: Box<NoiseNode>,
        curve: FloatCurve,
    },
    /// Samples its input at `p * scale + offset`.
    Remap {
        input: Box<NoiseNode>,
        scale: [f32; 3],
        offset: [f32; 3],
    },

    Add(Box<NoiseNode>, Box<NoiseNode>),
    Subtract(Box<NoiseNode>, Box<NoiseNode>),
    Multiply(Box<NoiseNode>, Box<NoiseNode>),
    Min(Box<NoiseNode>, Box<NoiseNode>),
    Max(Box<NoiseNode>, Box<NoiseNode>),
    /// `a + bias * (b - a)`.
    Blend {
        a: Box<NoiseNode>,
        b: Box<NoiseNode>,
        bias: f32,
    },

    /// `a` outside `[min, max]` of the control value, `b` inside, with an
    /// S-curve transition `falloff` wide on each boundary.
    Select {
        control: Box<NoiseNode>,
        a: Box<NoiseNode>,
        b: Box<NoiseNode>,
        falloff: f32,
        min: f32,
        max: f32,
    },
}

impl NoiseNode {
    /// Direct children in evaluation order.
    #[must_use]
    pub fn children(&self) -> Vec<&NoiseNode> {
        match self {
            NoiseNode::Fractal(_) | NoiseNode::Const(_) => Vec::new(),
            NoiseNode::Abs(input)
            | NoiseNode::Invert(input)
            | NoiseNode::Scale { input, .. }
            | NoiseNode::ScaleBias { input, .. }
            | NoiseNode::Clamp { input, .. }
            | NoiseNode::Curve { input, .. }
            | NoiseNode::Remap { input, .. } => vec![&**input],
            NoiseNode::Add(a, b)
            | NoiseNode::Subtract(a, b)
            | NoiseNode::Multiply(a, b)
            | NoiseNode::Min(a, b)
            | NoiseNode::Max(a, b)
            | NoiseNode::Blend { a, b, .. } => vec![&**a, &**b],
            NoiseNode::Select { control, a, b, .. } => vec![&**a, &**b, &**control],
        }
    }

    /// Number of nodes in this subtree.
    #[must_use]
    pub fn node_count(&self) -> usize {
        1 + self.children().iter().map(|c| c.node_count()).sum::<usize>()
    }
}

const MAX_OCTAVES: usize = 32;

/// An fBm generator over one of the supported base noises.
enum Fractal {
    Perlin(Fbm<Perlin>),
    Simplex(Fbm<Simplex>),
    OpenSimplex(Fbm<OpenSimplex>),
    SuperSimplex(Fbm<SuperSimplex>),
    Value(Fbm<Value>),
}

impl Fractal {
    fn build(params: &FractalParams) -> Self {
        fn configure<T>(fbm: Fbm<T>, params: &FractalParams) -> Fbm<T>
        where
            T: Default + noise::Seedable,
        {
            fbm.set_octaves(params.octaves.clamp(1, MAX_OCTAVES))
                .set_frequency(params.frequency)
                .set_lacunarity(params.lacunarity)
                .set_persistence(params.persistence)
        }

        let seed = params.seed;
        match params.kind {
            FractalKind::Perlin => Fractal::Perlin(configure(Fbm::new(seed), params)),
            FractalKind::Simplex => Fractal::Simplex(configure(Fbm::new(seed), params)),
            FractalKind::OpenSimplex => Fractal::OpenSimplex(configure(Fbm::new(seed), params)),
            FractalKind::SuperSimplex => Fractal::SuperSimplex(configure(Fbm::new(seed), params)),
            FractalKind::Value => Fractal::Value(configure(Fbm::new(seed), params)),
        }
    }

    fn get(&self, point: [f64; 3]) -> f64 {
        match self {
            Fractal::Perlin(f) => f.get(point),
            Fractal::Simplex(f) => f.get(point),
            Fractal::OpenSimplex(f) => f.get(point),
            Fractal::SuperSimplex(f) => f.get(point),
            Fractal::Value(f) => f.get(point),
        }
    }
}

/// The evaluable mirror of a [`NoiseNode`] tree, with generators built.
enum Op {
    Fractal(Box<Fractal>),
    Const(f32),
    Abs(Box<Op>),
    Invert(Box<Op>),
    ScaleBias(Box<Op>, f32, f32),
    Clamp(Box<Op>, f32, f32),
    Curve(Box<Op>, FloatCurve),
    Remap(Box<Op>, [f32; 3], [f32; 3]),
    Add(Box<Op>, Box<Op>),
    Subtract(Box<Op>, Box<Op>),
    Multiply(Box<Op>, Box<Op>),
    Min(Box<Op>, Box<Op>),
    Max(Box<Op>, Box<Op>),
    Blend(Box<Op>, Box<Op>, f32),
    Select {
        control: Box<Op>,
        a: Box<Op>,
        b: Box<Op>,
        falloff: f32,
        min: f32,
        max: f32,
    },
}

impl Op {
    fn build(node: &NoiseNode) -> Self {
        let b = |n: &NoiseNode| Box::new(Op::build(n));
        match node {
            NoiseNode::Fractal(params) => Op::Fractal(Box::new(Fractal::build(params))),
            NoiseNode::Const(v) => Op::Const(*v),
            NoiseNode::Abs(input) => Op::Abs(b(input)),
            NoiseNode::Invert(input) => Op::Invert(b(input)),
            NoiseNode::Scale { input, scale } => Op::ScaleBias(b(input), *scale, 0.0),
            NoiseNode::ScaleBias { input, scale, bias } => Op::ScaleBias(b(input), *scale, *bias),
            NoiseNode::Clamp { input, min, max } => Op::Clamp(b(input), *min, *max),
            NoiseNode::Curve { input, curve } => Op::Curve(b(input), curve.clone()),
            NoiseNode::Remap {
                input,
                scale,
                offset,
            } => Op::Remap(b(input), *scale, *offset),
            NoiseNode::Add(x, y) => Op::Add(b(x), b(y)),
            NoiseNode::Subtract(x, y) => Op::Subtract(b(x), b(y)),
            NoiseNode::Multiply(x, y) => Op::Multiply(b(x), b(y)),
            NoiseNode::Min(x, y) => Op::Min(b(x), b(y)),
            NoiseNode::Max(x, y) => Op::Max(b(x), b(y)),
            NoiseNode::Blend { a, b: other, bias } => Op::Blend(b(a), b(other), *bias),
            NoiseNode::Select {
                control,
                a,
                b: other,
                falloff,
                min,
                max,
            } => Op::Select {
                control: b(control),
                a: b(a),
                b: b(other),
                falloff: *falloff,
                min: *min,
                max: *max,
            },
        }
    }

    fn eval(&self, x: f32, y: f32, z: f32) -> f32 {
        match self {
            Op::Fractal(f) => f.get([f64::from(x), f64::from(y), f64::from(z)]) as f32,
            Op::Const(v) => *v,
            Op::Abs(i) => i.eval(x, y, z).abs(),
            Op::Invert(i) => -i.eval(x, y, z),
            Op::ScaleBias(i, s, bias) => i.eval(x, y, z) * s + bias,
            // Not f32::clamp: a misordered pair must not panic.
            Op::Clamp(i, min, max) => i.eval(x, y, z).max(*min).min(*max),
            Op::Curve(i, curve) => curve.evaluate(i.eval(x, y, z)),
            Op::Remap(i, s, o) => i.eval(x * s[0] + o[0], y * s[1] + o[1], z * s[2] + o[2]),
            Op::Add(a, b) => a.eval(x, y, z) + b.eval(x, y, z),
            Op::Subtract(a, b) => a.eval(x, y, z) - b.eval(x, y, z),
            Op::Multiply(a, b) => a.eval(x, y, z) * b.eval(x, y, z),
            Op::Min(a, b) => a.eval(x, y, z).min(b.eval(x, y, z)),
            Op::Max(a, b) => a.eval(x, y, z).max(b.eval(x, y, z)),
            Op::Blend(a, b, bias) => {
                let a = a.eval(x, y, z);
                a + bias * (b.eval(x, y, z) - a)
            }
            Op::Select {
                control,
                a,
                b,
                falloff,
                min,
                max,
            } => {
                let cv = control.eval(x, y, z);
                let f = *falloff;
                if f > 0.0 {
                    if cv < min - f {
                        a.eval(x, y, z)
                    } else if cv < min + f {
                        let t = s_curve((cv - (min - f)) / (2.0 * f));
                        lerp(a.eval(x, y, z), b.eval(x, y, z), t)
                    } else if cv < max - f {
                        b.eval(x, y, z)
                    } else if cv < max + f {
                        let t = s_curve((cv - (max - f)) / (2.0 * f));
                        lerp(b.eval(x, y, z), a.eval(x, y, z), t)
                    } else {
                        a.eval(x, y, z)
                    }
                } else if cv < *min || cv > *max {
                    a.eval(x, y, z)
                } else {
                    b.eval(x, y, z)
                }
            }
        }
    }
}

fn s_curve(t: f32) -> f32 {
    t * t * (3.0 - 2.0 * t)
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    (1.0 - t) * a + t * b
}

/// A built noise graph, ready to evaluate from any thread.
pub struct NoiseGraph {
    root: NoiseNode,
    op: Op,
}

impl std::fmt::Debug for NoiseGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoiseGraph").field("root", &self.root).finish()
    }
}

impl Clone for NoiseGraph {
    fn clone(&self) -> Self {
        Self::new(self.root.clone())
    }
}

impl PartialEq for NoiseGraph {
    fn eq(&self, other: &Self) -> bool {
        self.root == other.root
    }
}

impl NoiseGraph {
    #[must_use]
    pub fn new(root: NoiseNode) -> Self {
        let op = Op::build(&root);
        Self { root, op }
    }

    /// A graph that evaluates to 0 everywhere.
    #[must_use]
    pub fn zero() -> Self {
        Self::new(NoiseNode::Const(0.0))
    }

    #[must_use]
    pub fn root(&self) -> &NoiseNode {
        &self.root
    }

    #[must_use]
    pub fn evaluate(&self, x: f32, y: f32, z: f32) -> f32 {
        self.op.eval(x, y, z)
    }

    pub fn to_ron(&self) -> Result<String, TerrainError> {
        ron::ser::to_string_pretty(&self.root, ron::ser::PrettyConfig::new())
            .map_err(TerrainError::NoiseSerialize)
    }

    pub fn from_ron(source: &str) -> Result<Self, TerrainError> {
        let root: NoiseNode = ron::from_str(source).map_err(TerrainError::NoiseParse)?;
        Ok(Self::new(root))
    }

    /// Write the graph as RON.
    pub fn save(&self, path: &Path) -> Result<(), TerrainError> {
        std::fs::write(path, self.to_ron()?).map_err(|source| TerrainError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read a RON graph. Any failure is logged and yields [`NoiseGraph::zero`].
    #[must_use]
    pub fn load_or_zero(path: &Path) -> Self {
        let parsed = std::fs::read_to_string(path)
            .map_err(|source| TerrainError::Io {
                path: path.to_path_buf(),
                source,
            })
            .and_then(|s| Self::from_ron(&s));
        match parsed {
            Ok(graph) => {
                tracing::info!(
                    "Loaded noise graph from {} ({} nodes)",
                    path.display(),
                    graph.root.node_count()
                );
                graph
            }
            Err(e) => {
                tracing::error!("Noise graph unusable, using constant zero: {e}");
                Self::zero()
            }
        }
    }

    /// Distinct subtrees with how often each occurs, in first-seen pre-order.
    ///
    /// Subtrees are matched structurally, so a generator reused in several
    /// places is reported once with its use count.
    #[must_use]
    pub fn dedupe(&self) -> Vec<(&NoiseNode, usize)> {
        let mut unique: Vec<(&NoiseNode, usize)> = Vec::new();
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            match unique.iter_mut().find(|(seen, _)| *seen == node) {
                Some((_, count)) => *count += 1,
                None => unique.push((node, 1)),
            }
            stack.extend(node.children().into_iter().rev());
        }
        unique
    }
}
