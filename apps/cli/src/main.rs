use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use solutree_browser::{populate_demo, to_browser, to_model, SolutionBrowser, DEFAULT_SOLUTION_NAME};
use solutree_model::{
    level_order, load_solution, save_solution, ItemTree, ItemType, LabelRenderer, NodeHandle,
    PlainLabels, SolutionModel, StorageOptions, StorageOptionsStore,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "solutree-cli",
    about = "Create, inspect and edit solution trees stored as XML or SQLite",
    author,
    version
)]
struct Cli {
    /// 儲存選項 JSON 檔。 / Storage options JSON file.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    /// 輸出除錯紀錄。 / Emit debug logging.
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 建立僅含根節點的新解決方案。 / Create a new solution holding only its root.
    New(NewArgs),
    /// 寫出示範解決方案。 / Write the demo solution.
    Demo(FileArgs),
    /// 顯示解決方案樹。 / Print a solution tree.
    Show(ShowArgs),
    /// 新增項目。 / Add an item below a container.
    Add(AddArgs),
    /// 重新命名項目。 / Rename an item.
    Rename(RenameArgs),
    /// 移除項目與其子項目。 / Remove an item and everything below it.
    Remove(RemoveArgs),
    /// 在 XML 與 SQLite 格式間轉換。 / Convert between the XML and SQLite formats.
    Convert(ConvertArgs),
}

#[derive(Args)]
struct FileArgs {
    /// 解決方案檔（.solxml 或 .solsqlite）。 / Solution file (.solxml or .solsqlite).
    file: PathBuf,
}

#[derive(Args)]
struct NewArgs {
    /// 解決方案檔（.solxml 或 .solsqlite）。 / Solution file (.solxml or .solsqlite).
    file: PathBuf,
    /// 根節點名稱。 / Display name of the root item.
    #[arg(long, default_value = DEFAULT_SOLUTION_NAME)]
    name: String,
}

#[derive(Args)]
struct ShowArgs {
    /// 解決方案檔。 / Solution file.
    file: PathBuf,
    /// 以層序列出 id、父節點與層級。 / List level-order rows with id, parent and level.
    #[arg(long)]
    levels: bool,
}

#[derive(Args)]
struct AddArgs {
    /// 解決方案檔。 / Solution file.
    file: PathBuf,
    /// 父節點路徑，例如 `/Root/Folder`。 / Parent path such as `/Root/Folder`.
    parent: String,
    /// 項目類型。 / Item type.
    #[arg(value_enum)]
    item_type: ItemTypeChoice,
    /// 名稱；略過時自動建議。 / Name; a free one is suggested when omitted.
    name: Option<String>,
}

#[derive(Args)]
struct RenameArgs {
    /// 解決方案檔。 / Solution file.
    file: PathBuf,
    /// 項目路徑。 / Item path.
    path: String,
    /// 新名稱。 / New name.
    name: String,
}

#[derive(Args)]
struct RemoveArgs {
    /// 解決方案檔。 / Solution file.
    file: PathBuf,
    /// 項目路徑。 / Item path.
    path: String,
}

#[derive(Args)]
struct ConvertArgs {
    /// 來源解決方案檔。 / Source solution file.
    input: PathBuf,
    /// 目的解決方案檔；格式由副檔名決定。 / Destination file; the extension picks the format.
    output: PathBuf,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ItemTypeChoice {
    File,
    Folder,
    Project,
}

impl From<ItemTypeChoice> for ItemType {
    fn from(choice: ItemTypeChoice) -> Self {
        match choice {
            ItemTypeChoice::File => ItemType::File,
            ItemTypeChoice::Folder => ItemType::Folder,
            ItemTypeChoice::Project => ItemType::Project,
        }
    }
}

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let Cli {
        config,
        verbose,
        command,
    } = Cli::parse();
    init_logging(verbose);
    let options = load_options(config.as_deref())?;

    match command {
        Commands::New(args) => execute_new(args, &options),
        Commands::Demo(args) => execute_demo(args, &options),
        Commands::Show(args) => execute_show(args, &options),
        Commands::Add(args) => execute_add(args, &options),
        Commands::Rename(args) => execute_rename(args, &options),
        Commands::Remove(args) => execute_remove(args, &options),
        Commands::Convert(args) => execute_convert(args, &options),
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_options(path: Option<&Path>) -> Result<StorageOptions> {
    let Some(path) = path else {
        return Ok(StorageOptions::default());
    };
    let store = StorageOptionsStore::load(path)?;
    debug!(path = %path.display(), options = ?store.options(), "loaded storage options");
    Ok(store.into_options())
}

fn open_browser(path: &Path, options: &StorageOptions) -> Result<SolutionBrowser> {
    let model = load_solution(path, options)
        .with_context(|| format!("failed to load {}", path.display()))?;
    Ok(to_browser(&model)?)
}

fn save_browser(browser: &SolutionBrowser, path: &Path, options: &StorageOptions) -> Result<()> {
    let mut model = to_model(browser)?;
    save_model(&mut model, path, options)
}

fn save_model(model: &mut SolutionModel, path: &Path, options: &StorageOptions) -> Result<()> {
    save_solution(path, model, options).with_context(|| format!("failed to save {}", path.display()))
}

fn resolve(browser: &SolutionBrowser, path: &str) -> Result<NodeHandle> {
    browser
        .tree()
        .resolve_path(path)
        .ok_or_else(|| anyhow!("no item at path '{path}'"))
}

/// Item paths are '/'-separated.
fn check_name(name: &str) -> Result<()> {
    if name.contains('/') {
        bail!("item names cannot contain '/': '{name}'");
    }
    Ok(())
}

fn execute_new(args: NewArgs, options: &StorageOptions) -> Result<()> {
    check_name(&args.name)?;
    let mut model = SolutionModel::new(args.name)?;
    save_model(&mut model, &args.file, options)?;
    println!("Created {}", args.file.display());
    Ok(())
}

fn execute_demo(args: FileArgs, options: &StorageOptions) -> Result<()> {
    let mut browser = SolutionBrowser::new(DEFAULT_SOLUTION_NAME)?;
    populate_demo(&mut browser)?;
    save_browser(&browser, &args.file, options)?;
    println!(
        "Wrote demo solution with {} items to {}",
        browser.tree().len(),
        args.file.display()
    );
    Ok(())
}

fn execute_show(args: ShowArgs, options: &StorageOptions) -> Result<()> {
    let mut model = load_solution(&args.file, options)
        .with_context(|| format!("failed to load {}", args.file.display()))?;
    let tree = model.tree_mut();
    if args.levels {
        tree.assign_level_order_ids();
        print_levels(tree);
    } else {
        print_tree(tree, tree.root(), 0, &PlainLabels);
    }
    Ok(())
}

fn print_tree(tree: &ItemTree, handle: NodeHandle, depth: usize, labels: &dyn LabelRenderer) {
    println!("{}{}", "  ".repeat(depth), labels.label(tree, handle));
    for child in tree.children(handle) {
        print_tree(tree, child, depth + 1, labels);
    }
}

fn print_levels(tree: &ItemTree) {
    println!("level\tid\tparent\ttype\tname");
    for item in level_order(tree) {
        let Some(node) = tree.get(item.handle) else {
            continue;
        };
        let id = node.id().map_or(-1, |id| id.as_i64());
        let parent = node
            .parent()
            .and_then(|parent| tree.get(parent))
            .and_then(|parent| parent.id())
            .map_or(-1, |id| id.as_i64());
        println!(
            "{}\t{}\t{}\t{}\t{}",
            item.level,
            id,
            parent,
            node.item_type(),
            node.name()
        );
    }
}

fn execute_add(args: AddArgs, options: &StorageOptions) -> Result<()> {
    let mut browser = open_browser(&args.file, options)?;
    let parent = resolve(&browser, &args.parent)?;
    let item_type = ItemType::from(args.item_type);
    if !browser.can_add_item(parent, item_type) {
        bail!("cannot add a {item_type} below '{}'", args.parent);
    }
    let handle = match args.name {
        Some(name) => {
            check_name(&name)?;
            let handle = browser.add_child(name, item_type, parent)?;
            browser.sort_children(parent)?;
            handle
        }
        None => browser.add_item(parent, item_type)?,
    };
    let path = browser.tree().stack_path(handle);
    save_browser(&browser, &args.file, options)?;
    println!("Added {path}");
    Ok(())
}

fn execute_rename(args: RenameArgs, options: &StorageOptions) -> Result<()> {
    let mut browser = open_browser(&args.file, options)?;
    check_name(&args.name)?;
    let handle = resolve(&browser, &args.path)?;
    if !browser.can_start_rename(handle) {
        bail!("'{}' cannot be renamed", args.path);
    }
    browser.start_rename(handle)?;
    if !browser.rename_item(handle, &args.name)? {
        let reasons: Vec<String> = browser
            .take_notifications()
            .iter()
            .map(|note| format!("{}: {}", note.title(), note.message()))
            .collect();
        bail!("{}", reasons.join("; "));
    }
    let path = browser.tree().stack_path(handle);
    save_browser(&browser, &args.file, options)?;
    println!("Renamed to {path}");
    Ok(())
}

fn execute_remove(args: RemoveArgs, options: &StorageOptions) -> Result<()> {
    let mut browser = open_browser(&args.file, options)?;
    let handle = resolve(&browser, &args.path)?;
    if !browser.can_remove_item(handle) {
        bail!("the solution root cannot be removed");
    }
    browser.remove_item(handle)?;
    save_browser(&browser, &args.file, options)?;
    println!("Removed {}", args.path);
    Ok(())
}

fn execute_convert(args: ConvertArgs, options: &StorageOptions) -> Result<()> {
    let mut model = load_solution(&args.input, options)
        .with_context(|| format!("failed to load {}", args.input.display()))?;
    save_model(&mut model, &args.output, options)?;
    println!(
        "Converted {} -> {} ({} items)",
        args.input.display(),
        args.output.display(),
        model.tree().len()
    );
    Ok(())
}
