/// The fixed tip list. Rotation is by day of year, so every subscriber gets
/// the same tip on the same calendar day of their timezone.
pub const TIPS: [&str; 10] = [
    "Выключайте свет и электроприборы, когда они не используются",
    "Рационально используйте энергоресурсы",
    "Предпочитайте упаковки многоразового использования",
    "Используйте многоразовые пакеты",
    "Потребляйте меньше продуктов животного происхождения",
    "Сортируйте отходы",
    "Выбирайте экологически чистые виды транспорта",
    "Поддерживайте местных проихводителей - покупайте продукты у месиных фермеров",
    "Рассказывайте друзьями и близким о проблеме глобального потепления!",
    "Поддерживайте организации , работающие над решением проблемы изменения климата, учавствуйте в акциях и инициативах",
];

pub fn tip_of_day(day_of_year: u32) -> &'static str {
    TIPS[day_of_year as usize % TIPS.len()]
}
