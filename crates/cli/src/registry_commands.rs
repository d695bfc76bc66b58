//! Listing and inspection output.

use tendril_engine::Engine;

pub fn list_commands(engine: &Engine, json: bool, hidden: bool) -> anyhow::Result<()> {
    let commands: Vec<_> = engine
        .commands()
        .iter()
        .filter(|c| hidden || !c.metadata.hidden)
        .collect();

    if json {
        let entries: Vec<_> = commands.iter().map(|c| &c.metadata).collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if commands.is_empty() {
        println!("No commands found.");
        return Ok(());
    }

    let width = commands.iter().map(|c| c.id().len()).max().unwrap_or(0);
    for command in commands {
        let desc = command.metadata.description.as_deref().unwrap_or("");
        let id = if command.id().is_empty() {
            "(root)"
        } else {
            command.id()
        };
        println!("  {id:<width$}  {desc}");
    }
    Ok(())
}

pub fn list_topics(engine: &Engine, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(engine.topics())?);
        return Ok(());
    }

    if engine.topics().is_empty() {
        println!("No topics found.");
        return Ok(());
    }

    for topic in engine.topics().iter().filter(|t| !t.hidden) {
        match topic.description.as_deref() {
            Some(desc) => println!("  {}  {desc}", topic.name),
            None => println!("  {}", topic.name),
        }
    }
    Ok(())
}

pub fn list_plugins(engine: &Engine, json: bool) -> anyhow::Result<()> {
    if json {
        let entries: Vec<_> = engine.plugins().iter().map(|p| p.summary()).collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    for plugin in engine.plugins() {
        println!(
            "  {name} {version} ({kind}) {root}",
            name = plugin.name,
            version = plugin.version,
            kind = plugin.plugin_type,
            root = plugin.root.display(),
        );
        if let Some(tag) = &plugin.tag {
            println!("    ↳ tag: {tag}");
        }
        for child in plugin.children() {
            println!("    ↳ child: {}", child.name);
        }
    }
    Ok(())
}

pub fn command_info(engine: &Engine, id: &str) -> anyhow::Result<()> {
    let command = engine.find_command_must(id)?;
    let meta = &command.metadata;

    println!("ID:          {}", meta.id);
    if let Some(title) = &meta.title {
        println!("Title:       {title}");
    }
    if let Some(desc) = &meta.description {
        println!("Description: {desc}");
    }
    if let Some(usage) = &meta.usage {
        println!("Usage:       {usage}");
    }
    if !meta.aliases.is_empty() {
        println!("Aliases:     {}", meta.aliases.join(", "));
    }
    if let Some(plugin) = &meta.plugin_name {
        println!("Plugin:      {plugin}");
    }
    if let Some(kind) = meta.plugin_type {
        println!("Type:        {kind}");
    }
    println!("Hidden:      {}", meta.hidden);

    if !meta.args.is_empty() {
        println!("Args:");
        for arg in &meta.args {
            let required = if arg.required { " (required)" } else { "" };
            println!(
                "  {}{required}  {}",
                arg.name,
                arg.description.as_deref().unwrap_or("")
            );
        }
    }
    if !meta.flags.is_empty() {
        println!("Flags:");
        for (name, flag) in &meta.flags {
            let short = flag.char.map(|c| format!("-{c}, ")).unwrap_or_default();
            println!(
                "  {short}--{name}  {}",
                flag.description.as_deref().unwrap_or("")
            );
        }
    }
    if let Some(help) = &meta.help {
        println!("\n{help}");
    }
    Ok(())
}
