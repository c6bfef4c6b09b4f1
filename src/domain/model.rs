// ドメインモデル（エンティティと値オブジェクト）

mod value_objects;
mod order;
mod product;

pub use value_objects::{
    OrderId, ProductId, UserId,
    Money,
    OrderItem, OrderItemRequest,
    StockItem, StockShortage,
    OrderStatus,
};

pub use order::{plan_transition, NewOrder, Order, Transition};
pub use product::{NewProduct, Product};
