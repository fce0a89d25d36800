use std::{
    cell::Cell,
    collections::BTreeMap,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    rc::Rc,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use rectswap::{
    CommitRecord, Config, CoordinateSpaceController, DisplayEnv as _, Grip, LayoutHost as _,
    ManualWatch, Modifiers, NodeId, ObserveOptions, ObserverDiagnostics, Origin, Placement,
    PointerEvent, Rect, RectObserver, ResponsiveForm, Scene, Size, Subscriber, Vec2,
};

#[derive(Parser, Debug)]
#[command(name = "rectswap", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay an edit script against an in-memory scene and report the final placements.
    Replay(ReplayArgs),
    /// Express an absolute rectangle as parent percentages.
    Convert(ConvertArgs),
}

#[derive(Parser, Debug)]
struct ReplayArgs {
    /// Input script JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output report JSON (stdout when omitted).
    #[arg(long)]
    out: Option<PathBuf>,

    /// Configuration JSON; overrides the script's `config`.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct ConvertArgs {
    /// Parent box size, `WIDTHxHEIGHT`.
    #[arg(long, value_parser = parse_size)]
    parent: Size,

    /// Parent-relative rectangle, `x,y,width,height`.
    #[arg(long, value_parser = parse_rect)]
    rect: Rect,

    /// Locate the center instead of the top-left corner.
    #[arg(long)]
    center: bool,

    /// Decimal places kept.
    #[arg(long, default_value_t = 4)]
    precision: u32,
}

#[derive(serde::Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct Script {
    #[serde(default = "default_viewport")]
    viewport: Size,
    #[serde(default)]
    config: Config,
    nodes: Vec<NodeSpec>,
    /// Node names to observe while replaying.
    #[serde(default)]
    observe: Vec<String>,
    steps: Vec<Step>,
}

fn default_viewport() -> Size {
    Size::new(1280.0, 720.0)
}

#[derive(serde::Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct NodeSpec {
    name: String,
    /// Viewport rectangle of a root node.
    #[serde(default)]
    root: Option<Rect>,
    #[serde(default)]
    parent: Option<String>,
    #[serde(default)]
    placement: Option<Placement>,
}

#[derive(serde::Deserialize, Debug)]
#[serde(tag = "op", rename_all = "kebab-case")]
enum Step {
    Enter {
        node: String,
    },
    /// Press at `from`, move to `to` in `samples` evenly spaced updates.
    Drag {
        node: String,
        grip: Grip,
        from: [f64; 2],
        to: [f64; 2],
        #[serde(default = "one")]
        samples: u32,
        #[serde(default)]
        modifiers: Modifiers,
    },
    /// Shorthand for a complete move gesture by `(dx, dy)`.
    Move {
        node: String,
        dx: f64,
        dy: f64,
    },
    /// Incremental offset kept apart from the base rectangle until commit.
    Nudge {
        node: String,
        dx: f64,
        dy: f64,
    },
    End {
        node: String,
    },
    Commit {
        node: String,
    },
    Cancel {
        node: String,
    },
    Frame,
}

fn one() -> u32 {
    1
}

#[derive(serde::Serialize, Debug)]
struct Report {
    placements: BTreeMap<String, PlacementReport>,
    commits: Vec<NamedCommit>,
    notifications: BTreeMap<String, usize>,
    observer: Option<ObserverDiagnostics>,
}

#[derive(serde::Serialize, Debug)]
struct PlacementReport {
    placement: Placement,
    css: String,
}

#[derive(serde::Serialize, Debug)]
struct NamedCommit {
    name: String,
    #[serde(flatten)]
    record: CommitRecord,
}

const FRAME_MS: f64 = 16.0;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Replay(args) => cmd_replay(args),
        Command::Convert(args) => cmd_convert(args),
    }
}

fn read_script_json(path: &Path) -> anyhow::Result<Script> {
    let f = File::open(path).with_context(|| format!("open script '{}'", path.display()))?;
    let r = BufReader::new(f);
    let script: Script = serde_json::from_reader(r).with_context(|| "parse script JSON")?;
    Ok(script)
}

fn cmd_replay(args: ReplayArgs) -> anyhow::Result<()> {
    let mut script = read_script_json(&args.in_path)?;
    if let Some(path) = &args.config {
        script.config = Config::from_path(path)?;
    }
    script.config.validate()?;

    let mut replay = Replay::build(&script)?;
    for (i, step) in script.steps.iter().enumerate() {
        replay
            .run(step)
            .with_context(|| format!("step {i} ({step:?})"))?;
    }
    replay.frame()?;

    let report = replay.report();
    let json = serde_json::to_string_pretty(&report).with_context(|| "serialize report")?;
    match &args.out {
        Some(out) => {
            if let Some(parent) = out.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create output dir '{}'", parent.display()))?;
            }
            std::fs::write(out, json).with_context(|| format!("write '{}'", out.display()))?;
            eprintln!("wrote {}", out.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

struct Replay {
    scene: Scene,
    names: BTreeMap<String, NodeId>,
    controller: CoordinateSpaceController,
    observer: Option<RectObserver>,
    observed: Vec<NodeId>,
    counts: BTreeMap<NodeId, Rc<Cell<usize>>>,
    commits: Vec<(NodeId, CommitRecord)>,
}

impl Replay {
    fn build(script: &Script) -> anyhow::Result<Self> {
        let mut scene = Scene::new(script.viewport);
        let mut names = BTreeMap::new();
        for spec in &script.nodes {
            let id = match (&spec.root, &spec.parent, &spec.placement) {
                (Some(rect), None, None) => scene.add_root(*rect),
                (None, Some(parent), Some(placement)) => {
                    let parent = *names
                        .get(parent)
                        .with_context(|| format!("node '{}': unknown parent '{parent}'", spec.name))?;
                    scene.add_child(parent, *placement)?
                }
                _ => anyhow::bail!(
                    "node '{}' needs either `root`, or `parent` and `placement`",
                    spec.name
                ),
            };
            if names.insert(spec.name.clone(), id).is_some() {
                anyhow::bail!("duplicate node name '{}'", spec.name);
            }
        }

        let controller = CoordinateSpaceController::new(script.config.edit.clone())?;
        let mut replay = Self {
            scene,
            names,
            controller,
            observer: None,
            observed: Vec::new(),
            counts: BTreeMap::new(),
            commits: Vec::new(),
        };

        if !script.observe.is_empty() {
            let watch = ManualWatch::new();
            let mut observer =
                RectObserver::new(script.config.observer.clone(), watch.factory(), &replay.scene)?;
            for name in &script.observe {
                let node = replay.node(name)?;
                let count = Rc::new(Cell::new(0usize));
                let sink = count.clone();
                observer.observe(
                    &replay.scene,
                    node,
                    Subscriber::callback(move |_| {
                        sink.set(sink.get() + 1);
                        Ok(())
                    }),
                    ObserveOptions::default(),
                )?;
                replay.observed.push(node);
                replay.counts.insert(node, count);
            }
            replay.observer = Some(observer);
        }
        Ok(replay)
    }

    fn node(&self, name: &str) -> anyhow::Result<NodeId> {
        self.names
            .get(name)
            .copied()
            .with_context(|| format!("unknown node '{name}'"))
    }

    fn run(&mut self, step: &Step) -> anyhow::Result<()> {
        match step {
            Step::Enter { node } => {
                let id = self.node(node)?;
                self.controller.enter_edit(&mut self.scene, id)?;
            }
            Step::Drag {
                node,
                grip,
                from,
                to,
                samples,
                modifiers,
            } => {
                let id = self.node(node)?;
                let press = PointerEvent::new(1, from[0], from[1]).with_modifiers(*modifiers);
                self.controller.start_drag(id, press, *grip)?;
                let n = (*samples).max(1);
                for k in 1..=n {
                    let t = f64::from(k) / f64::from(n);
                    let sample = PointerEvent::new(
                        1,
                        from[0] + (to[0] - from[0]) * t,
                        from[1] + (to[1] - from[1]) * t,
                    )
                    .with_modifiers(*modifiers);
                    self.controller.update_drag(&mut self.scene, id, sample)?;
                    self.frame()?;
                }
            }
            Step::Move { node, dx, dy } => {
                let id = self.node(node)?;
                self.controller
                    .start_drag(id, PointerEvent::new(1, 0.0, 0.0), Grip::Move)?;
                self.controller
                    .update_drag(&mut self.scene, id, PointerEvent::new(1, *dx, *dy))?;
                self.controller.end_drag(&mut self.scene, id)?;
            }
            Step::Nudge { node, dx, dy } => {
                let id = self.node(node)?;
                self.controller
                    .nudge_by(&mut self.scene, id, Vec2::new(*dx, *dy))?;
            }
            Step::End { node } => {
                let id = self.node(node)?;
                self.controller.end_drag(&mut self.scene, id)?;
            }
            Step::Commit { node } => {
                let id = self.node(node)?;
                if !self.controller.commit(&mut self.scene, id)? {
                    eprintln!("commit of '{node}' skipped");
                } else if let Some(record) = self.controller.last_commit(id) {
                    self.commits.push((id, *record));
                }
            }
            Step::Cancel { node } => {
                let id = self.node(node)?;
                self.controller.cancel_edit(&mut self.scene, id)?;
            }
            Step::Frame => self.frame()?,
        }
        Ok(())
    }

    /// One display refresh: flush queued writes, forward geometry changes, tick the observer.
    fn frame(&mut self) -> anyhow::Result<()> {
        self.scene.advance_ms(FRAME_MS);
        self.controller.flush_frame(&mut self.scene)?;
        if let Some(observer) = &mut self.observer {
            for node in &self.observed {
                observer.on_geometry_changed(&self.scene, *node);
            }
            observer.tick(&self.scene, self.scene.now_ms());
        }
        Ok(())
    }

    fn report(&self) -> Report {
        let name_of = |id: NodeId| {
            self.names
                .iter()
                .find(|(_, n)| **n == id)
                .map(|(name, _)| name.clone())
                .unwrap_or_else(|| id.to_string())
        };
        let placements = self
            .names
            .iter()
            .filter_map(|(name, id)| {
                let placement = self.scene.placement(*id)?;
                Some((
                    name.clone(),
                    PlacementReport {
                        placement,
                        css: placement.declarations().to_string(),
                    },
                ))
            })
            .collect();
        let commits = self
            .commits
            .iter()
            .map(|(id, record)| NamedCommit {
                name: name_of(*id),
                record: *record,
            })
            .collect();
        let notifications = self
            .counts
            .iter()
            .map(|(id, count)| (name_of(*id), count.get()))
            .collect();
        Report {
            placements,
            commits,
            notifications,
            observer: self.observer.as_ref().map(RectObserver::diagnostics),
        }
    }
}

fn cmd_convert(args: ConvertArgs) -> anyhow::Result<()> {
    let origin = if args.center {
        Origin::Center
    } else {
        Origin::TopLeft
    };
    let form = ResponsiveForm::from_rect(args.rect, args.parent, origin)
        .with_context(|| format!("parent {}x{} has no area", args.parent.width, args.parent.height))?
        .rounded(args.precision);
    println!("{}", serde_json::to_string_pretty(&form)?);
    println!("{}", Placement::Responsive(form).declarations());
    Ok(())
}

fn parse_size(s: &str) -> Result<Size, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
    let w: f64 = w.trim().parse().map_err(|e| format!("width: {e}"))?;
    let h: f64 = h.trim().parse().map_err(|e| format!("height: {e}"))?;
    Ok(Size::new(w, h))
}

fn parse_rect(s: &str) -> Result<Rect, String> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<f64>().map_err(|e| format!("'{p}': {e}")))
        .collect::<Result<Vec<_>, _>>()?;
    let [x, y, w, h] = parts[..] else {
        return Err(format!("expected x,y,width,height, got '{s}'"));
    };
    Ok(Rect::new(x, y, x + w, y + h))
}
