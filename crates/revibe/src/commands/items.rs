//! Item commands.

use anyhow::{Result, bail};
use clap::Subcommand;
use revibe_core::items::ideas;
use revibe_core::{BinCategory, Idea, Item, ItemId, ItemUpdate, NewItem, validate_category};

use crate::app::App;

#[derive(Subcommand, Debug)]
pub enum ItemsAction {
    /// Record a new item
    Add {
        /// Bin category (Organic, Plastic, Paper, Glass, Metal, Electronics, Others)
        #[arg(short, long)]
        category: String,
        /// Short title
        #[arg(short, long)]
        title: String,
        /// Description
        #[arg(short, long)]
        description: String,
        /// Reuse idea as "title: description" (repeatable)
        #[arg(short, long = "idea", value_name = "IDEA")]
        ideas: Vec<String>,
        /// Image reference
        #[arg(long)]
        image: Option<String>,
    },
    /// List all items, or those in one category sorted by title
    List {
        /// Only items in this bin category
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Show the most recently added items
    Recent {
        /// Number of items (defaults to the configured limit)
        #[arg(short = 'n', long)]
        limit: Option<i64>,
    },
    /// Show one item with its ideas
    Show {
        /// Item id
        id: i64,
    },
    /// Change fields of an item
    Update {
        /// Item id
        id: i64,
        /// New bin category
        #[arg(short, long)]
        category: Option<String>,
        /// New title
        #[arg(short, long)]
        title: Option<String>,
        /// New description
        #[arg(short, long)]
        description: Option<String>,
        /// Replace ideas with these (repeatable)
        #[arg(short, long = "idea", value_name = "IDEA")]
        ideas: Vec<String>,
        /// New image reference
        #[arg(long)]
        image: Option<String>,
        /// Remove the image reference
        #[arg(long, conflicts_with = "image")]
        clear_image: bool,
    },
    /// Delete an item
    Delete {
        /// Item id
        id: i64,
    },
}

pub async fn run(app: &App, action: ItemsAction) -> Result<()> {
    let store = app.items().await?;

    match action {
        ItemsAction::Add {
            category,
            title,
            description,
            ideas,
            image,
        } => {
            validate_category(&category)?;
            let mut item =
                NewItem::new(category, title, description).with_ideas(parse_ideas(&ideas));
            if let Some(image) = image {
                item = item.with_image_uri(image);
            }
            let id = store.add_item(&item).await?;
            println!("Added item {id}");
        }
        ItemsAction::List { category } => {
            let items = match category {
                Some(category) => {
                    if BinCategory::parse(&category).is_none() {
                        eprintln!("Note: {category:?} is not a known bin category");
                    }
                    store.fetch_items_by_category(&category).await?
                }
                None => store.fetch_items().await?,
            };
            print_list(&items);
        }
        ItemsAction::Recent { limit } => {
            let limit = limit.unwrap_or(app.config.recent_limit);
            print_list(&store.fetch_recent_items(Some(limit)).await?);
        }
        ItemsAction::Show { id } => match store.fetch_item_by_id(ItemId::new(id)).await? {
            Some(item) => print_item(&item),
            None => bail!("No item with id {id}"),
        },
        ItemsAction::Update {
            id,
            category,
            title,
            description,
            ideas,
            image,
            clear_image,
        } => {
            let id = ItemId::new(id);
            let Some(item) = store.fetch_item_by_id(id).await? else {
                bail!("No item with id {id}");
            };

            let mut update = ItemUpdate::from(&item);
            if let Some(category) = category {
                validate_category(&category)?;
                update.bin_category = category;
            }
            if let Some(title) = title {
                update.description_title = title;
            }
            if let Some(description) = description {
                update.description = description;
            }
            if !ideas.is_empty() {
                update.ideas = parse_ideas(&ideas);
            }
            if image.is_some() || clear_image {
                update.image_uri = image;
            }

            let rows = store.update_item(id, &update).await?;
            println!("Updated {rows} item(s)");
        }
        ItemsAction::Delete { id } => {
            let rows = store.delete_item(ItemId::new(id)).await?;
            if rows == 0 {
                bail!("No item with id {id}");
            }
            println!("Deleted item {id}");
        }
    }

    Ok(())
}

fn parse_ideas(raw: &[String]) -> Vec<Idea> {
    raw.iter().flat_map(|idea| ideas::decode(idea.as_str())).collect()
}

fn print_list(items: &[Item]) {
    if items.is_empty() {
        println!("No items");
        return;
    }
    for item in items {
        println!(
            "{:>4}  {:<12} {}  ({} {})",
            item.id.0,
            item.bin_category,
            item.description_title,
            item.created_date,
            item.created_time
        );
    }
}

fn print_item(item: &Item) {
    println!("#{} {}", item.id, item.description_title);
    println!("Category: {}", item.bin_category);
    println!("Created:  {} {}", item.created_date, item.created_time);
    if let Some(image) = &item.image_uri {
        println!("Image:    {image}");
    }
    println!();
    println!("{}", item.description);
    if !item.ideas.is_empty() {
        println!();
        println!("Ideas:");
        for idea in &item.ideas {
            println!("  - {}: {}", idea.title, idea.description);
        }
    }
}
