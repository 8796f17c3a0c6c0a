use crate::models::FoodRecord;

/// Totals for one day of food records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyTotals {
    pub calories: f64,
    pub protein: f64,
    pub total_fat: f64,
    pub carbohydrates: f64,
    pub fiber: f64,
    pub meals_count: usize,
}

impl DailyTotals {
    pub fn from_records(records: &[FoodRecord]) -> Self {
        records.iter().fold(Self::default(), |mut totals, record| {
            totals.calories += record.calories;
            totals.protein += record.protein;
            totals.total_fat += record.total_fat;
            totals.carbohydrates += record.carbohydrates;
            totals.fiber += record.fiber;
            totals.meals_count += 1;
            totals
        })
    }
}

pub fn format_daily_report(records: &[FoodRecord], calorie_goal: u32) -> String {
    let totals = DailyTotals::from_records(records);
    let calorie_bar = create_progress_bar(totals.calories, calorie_goal as f64);

    let meals = records
        .iter()
        .map(|r| format!("  • {} {} ({:.0} g, {:.0} kcal)", r.meal_type, r.food_name, r.weight, r.calories))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "📊 Daily Report\n\n\
         🔥 Calories\n\
         {}\n\
         {:.0}/{} kcal ({}%)\n\n\
         🥩 Protein: {:.1} g\n\
         🧈 Fat: {:.1} g\n\
         🍞 Carbohydrates: {:.1} g\n\
         🌾 Fiber: {:.1} g\n\n\
         🍽️ Meals: {}\n\
         {}\n\n\
         {}",
        calorie_bar.bar,
        totals.calories,
        calorie_goal,
        calorie_bar.percentage,
        totals.protein,
        totals.total_fat,
        totals.carbohydrates,
        totals.fiber,
        totals.meals_count,
        meals,
        get_motivational_message(totals.calories, calorie_goal as f64)
    )
}

struct ProgressBar {
    bar: String,
    percentage: i32,
}

fn create_progress_bar(current: f64, goal: f64) -> ProgressBar {
    let percentage = if goal > 0.0 {
        ((current / goal) * 100.0).clamp(0.0, 100.0) as i32
    } else {
        0
    };
    let filled = (percentage / 10) as usize; // 10 steps
    let empty = 10 - filled;

    let bar = format!("{}{}", "█".repeat(filled), "░".repeat(empty));

    ProgressBar { bar, percentage }
}

fn get_motivational_message(calories: f64, goal: f64) -> String {
    if calories == 0.0 {
        "📸 Nothing logged yet today. Snap your next meal!"
    } else if calories < goal * 0.6 {
        "🍽️ Your intake is low. Make sure you eat enough."
    } else if calories > goal * 1.2 {
        "⚠️ Your intake is above target. Watch your portions."
    } else {
        "👍 You're on track. Keep it up!"
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(food: &str, calories: f64, protein: f64) -> FoodRecord {
        FoodRecord {
            food_name: food.to_string(),
            meal_type: "午餐".to_string(),
            weight: 100.0,
            calories,
            protein,
            ..Default::default()
        }
    }

    #[test]
    fn test_progress_bar() {
        let bar = create_progress_bar(1000.0, 2000.0);
        assert_eq!(bar.percentage, 50);
        assert_eq!(bar.bar, "█████░░░░░");

        let over = create_progress_bar(5000.0, 2000.0);
        assert_eq!(over.percentage, 100);
        assert_eq!(over.bar, "██████████");

        assert_eq!(create_progress_bar(300.0, 0.0).bar, "░░░░░░░░░░");
    }

    #[test]
    fn test_daily_totals() {
        let totals = DailyTotals::from_records(&[record("rice", 200.0, 4.0), record("egg", 78.0, 6.0)]);
        assert_eq!(totals.calories, 278.0);
        assert_eq!(totals.protein, 10.0);
        assert_eq!(totals.meals_count, 2);
    }

    #[test]
    fn test_report_content() {
        let report = format_daily_report(&[record("rice", 1000.0, 20.0)], 2000);
        assert!(report.contains("1000/2000 kcal (50%)"));
        assert!(report.contains("午餐 rice"));
        assert!(report.contains("Protein: 20.0 g"));
        assert!(report.contains("Meals: 1"));
    }

    #[test]
    fn test_empty_day() {
        let report = format_daily_report(&[], 2000);
        assert!(report.contains("0/2000 kcal (0%)"));
        assert!(report.contains("Nothing logged yet"));
    }
}
