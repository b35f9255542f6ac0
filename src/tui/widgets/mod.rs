pub mod charts;
pub mod color;
pub mod help;
pub mod stat_cards;
pub mod status_bar;
pub mod tabs;
pub mod task_list;
