use bevy::prelude::*;
use crossbeam_channel::Receiver;
use notify::{Event as NotifyEvent, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};

use crate::components::EditorConfig;
use crate::templates::{TemplateDef, TemplateRegistry};

pub const SCENE_EXTENSION: &str = ".scene.json";
pub const SCRIPT_EXTENSION: &str = ".rhai";
pub const TEMPLATE_EXTENSION: &str = ".template.json";

/// Cached project-relative file listings, refreshed when the watcher sees
/// any change under the project directory.
#[derive(Resource, Default)]
pub struct ProjectIndex {
    pub root: PathBuf,
    pub scenes: Vec<String>,
    pub scripts: Vec<String>,
    pub templates: Vec<String>,
}

#[derive(Resource)]
pub struct ProjectWatchReceiver(pub Receiver<()>);

pub struct ProjectPlugin;

impl Plugin for ProjectPlugin {
    fn build(&self, app: &mut App) {
        let project_dir = app
            .world()
            .get_resource::<EditorConfig>()
            .map(|c| c.project_dir.clone())
            .unwrap_or_else(|| PathBuf::from("project"));

        let (tx, rx) = crossbeam_channel::unbounded::<()>();
        app.insert_resource(ProjectWatchReceiver(rx));
        app.insert_resource(scan_project(&project_dir));

        let watch_dir = project_dir.clone();
        std::thread::spawn(move || {
            run_watcher(watch_dir, tx);
        });

        app.add_systems(Startup, load_project_templates);
        app.add_systems(Update, process_watch_events);
    }
}

fn run_watcher(project_dir: PathBuf, tx: crossbeam_channel::Sender<()>) {
    let mut watcher: RecommendedWatcher = match notify::recommended_watcher(
        move |res: Result<NotifyEvent, notify::Error>| {
            if res.is_ok() {
                let _ = tx.send(());
            }
        },
    ) {
        Ok(w) => w,
        Err(e) => {
            eprintln!("[Strata] Project watcher unavailable: {e}");
            return;
        }
    };
    if let Err(e) = watcher.watch(&project_dir, RecursiveMode::Recursive) {
        eprintln!(
            "[Strata] Not watching {} ({e}); project scans will be stale",
            project_dir.display()
        );
        return;
    }
    // keep the watcher alive for the process lifetime
    loop {
        std::thread::sleep(std::time::Duration::from_secs(60));
    }
}

fn process_watch_events(
    receiver: Res<ProjectWatchReceiver>,
    mut index: ResMut<ProjectIndex>,
    mut registry: ResMut<TemplateRegistry>,
) {
    if receiver.0.try_iter().count() == 0 {
        return;
    }
    let root = index.root.clone();
    *index = scan_project(&root);
    load_templates_into(&index, &mut registry);
}

fn load_project_templates(index: Res<ProjectIndex>, mut registry: ResMut<TemplateRegistry>) {
    load_templates_into(&index, &mut registry);
}

/// Project `*.template.json` files extend the built-in registry; a file
/// named `wall.template.json` registers template `wall`.
fn load_templates_into(index: &ProjectIndex, registry: &mut TemplateRegistry) {
    for rel in &index.templates {
        let path = index.root.join(rel);
        let Ok(text) = std::fs::read_to_string(&path) else {
            continue;
        };
        match serde_json::from_str::<TemplateDef>(&text) {
            Ok(def) => {
                let name = rel
                    .rsplit('/')
                    .next()
                    .unwrap_or(rel)
                    .trim_end_matches(TEMPLATE_EXTENSION)
                    .to_string();
                registry.insert(name, def);
            }
            Err(e) => eprintln!("[Strata] Skipping invalid template {rel}: {e}"),
        }
    }
}

/// Walk the project directory (iteratively) collecting files by extension.
pub fn scan_project(root: &Path) -> ProjectIndex {
    let mut index = ProjectIndex {
        root: root.to_path_buf(),
        ..Default::default()
    };
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Ok(rel) = path.strip_prefix(root) else {
                continue;
            };
            let rel = rel.to_string_lossy().replace('\\', "/");
            if name.ends_with(TEMPLATE_EXTENSION) {
                index.templates.push(rel);
            } else if name.ends_with(SCENE_EXTENSION) {
                index.scenes.push(rel);
            } else if name.ends_with(SCRIPT_EXTENSION) {
                index.scripts.push(rel);
            }
        }
    }
    index.scenes.sort_unstable();
    index.scripts.sort_unstable();
    index.templates.sort_unstable();
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "strata-project-{tag}-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(dir.join("levels")).unwrap();
        dir
    }

    #[test]
    fn scan_collects_by_extension_recursively() {
        let dir = unique_temp_dir("scan");
        std::fs::write(dir.join("main.scene.json"), "{}").unwrap();
        std::fs::write(dir.join("levels/cave.scene.json"), "{}").unwrap();
        std::fs::write(dir.join("levels/spawner.rhai"), "1").unwrap();
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let index = scan_project(&dir);
        assert_eq!(
            index.scenes,
            vec!["levels/cave.scene.json".to_string(), "main.scene.json".to_string()]
        );
        assert_eq!(index.scripts, vec!["levels/spawner.rhai".to_string()]);
        assert!(index.templates.is_empty());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn project_templates_register_by_stem() {
        let dir = unique_temp_dir("templates");
        let def = serde_json::json!({
            "type_name": "MeshNode",
            "name": "Wall",
            "properties": { "mesh": { "resource": "meshes/wall.mesh" } },
        });
        std::fs::write(dir.join("wall.template.json"), def.to_string()).unwrap();

        let index = scan_project(&dir);
        assert_eq!(index.templates, vec!["wall.template.json".to_string()]);

        let mut registry = TemplateRegistry::default();
        load_templates_into(&index, &mut registry);
        let template = registry.get("wall").expect("registered from project dir");
        assert_eq!(template.type_name, "MeshNode");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_directory_scans_empty() {
        let index = scan_project(Path::new("/definitely/not/here"));
        assert!(index.scenes.is_empty());
        assert!(index.scripts.is_empty());
    }
}
